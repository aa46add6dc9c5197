//! Project schedule endpoints

use super::files::read_json;
use super::{ApiError, AppState};
use crate::pmo::{ScheduleData, ScheduleMilestone, ScheduleTask, TaskCreate, TaskUpdate};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;

fn text(entry: &Value, key: &str) -> Option<String> {
    match entry.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn id_of(entry: &Value, key: &str) -> String {
    text(entry, key).or_else(|| text(entry, "id")).unwrap_or_default()
}

/// Schedule straight from `schedule.json`; items carry `id = 0`
fn schedule_from_file(code: &str, data: &Value) -> ScheduleData {
    let list = |key: &str| data.get(key).and_then(Value::as_array).cloned().unwrap_or_default();

    let tasks = list("tasks")
        .iter()
        .map(|t| ScheduleTask {
            id: 0,
            project_code: code.to_string(),
            task_id: id_of(t, "task_id"),
            name: text(t, "name").unwrap_or_default(),
            category: text(t, "category"),
            start_date: text(t, "start_date"),
            end_date: text(t, "end_date"),
            status: text(t, "status").unwrap_or_else(|| "pending".to_string()),
            depends_on: match t.get("depends_on") {
                Some(Value::String(s)) => Some(s.clone()),
                Some(v @ Value::Array(_)) => Some(v.to_string()),
                _ => None,
            },
            assignee: text(t, "assignee"),
            supplier: text(t, "supplier"),
            notes: text(t, "notes"),
            is_critical: t.get("is_critical").and_then(Value::as_bool).unwrap_or(false),
        })
        .collect();

    let milestones = list("milestones")
        .iter()
        .map(|m| ScheduleMilestone {
            id: 0,
            project_code: code.to_string(),
            milestone_id: id_of(m, "milestone_id"),
            name: text(m, "name").unwrap_or_default(),
            target_date: text(m, "target_date"),
            status: text(m, "status").unwrap_or_else(|| "on_track".to_string()),
        })
        .collect();

    ScheduleData { tasks, milestones }
}

pub async fn get_schedule(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ScheduleData>, ApiError> {
    let tasks = state.db.list_tasks(&code).await?;
    let milestones = state.db.list_milestones(&code).await?;
    if !tasks.is_empty() || !milestones.is_empty() {
        return Ok(Json(ScheduleData { tasks, milestones }));
    }

    let candidates = [
        state.pmo_root().join("pmo").join(&code).join("schedule.json"),
        state.project_dir(&code).join("schedule.json"),
    ];
    let data = candidates
        .iter()
        .filter(|p| p.is_file())
        .find_map(|p| read_json(p));

    Ok(Json(match data {
        Some(data) => schedule_from_file(&code, &data),
        None => ScheduleData::default(),
    }))
}

pub async fn create_task(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(input): Json<TaskCreate>,
) -> Result<(StatusCode, Json<ScheduleTask>), ApiError> {
    Ok((StatusCode::CREATED, Json(state.db.create_task(&code, &input).await?)))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path((code, task_id)): Path<(String, String)>,
    Json(input): Json<TaskUpdate>,
) -> Result<Json<ScheduleTask>, ApiError> {
    Ok(Json(state.db.update_task(&code, &task_id, &input).await?))
}

#[cfg(test)]
mod tests {
    use crate::server::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_filesystem_fallback() {
        let app = TestApp::new(None).await;
        app.write_file(
            "01001/schedule.json",
            &json!({
                "tasks": [{"id": "T1", "name": "Design", "depends_on": ["T0"]}],
                "milestones": [{"id": "M1", "name": "FAT"}]
            })
            .to_string(),
        );

        let (status, body) = app.json("GET", "/api/projects/01001/schedule", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tasks"][0]["id"], 0);
        assert_eq!(body["tasks"][0]["task_id"], "T1");
        assert_eq!(body["tasks"][0]["depends_on"], r#"["T0"]"#);
        assert_eq!(body["milestones"][0]["status"], "on_track");
    }

    #[tokio::test]
    async fn test_pmo_subdirectory_takes_precedence() {
        let app = TestApp::new(None).await;
        app.write_file(
            "pmo/01001/schedule.json",
            &json!({"tasks": [{"task_id": "A", "name": "From pmo"}]}).to_string(),
        );
        app.write_file(
            "01001/schedule.json",
            &json!({"tasks": [{"task_id": "B", "name": "From root"}]}).to_string(),
        );
        let (_, body) = app.json("GET", "/api/projects/01001/schedule", None).await;
        assert_eq!(body["tasks"][0]["task_id"], "A");
    }

    #[tokio::test]
    async fn test_task_create_conflict_and_update() {
        let app = TestApp::new(None).await;
        let task = json!({"task_id": "T1", "name": "Install", "start_date": "2025-05-01"});

        let (status, created) = app
            .json("POST", "/api/projects/01001/schedule/tasks", Some(task.clone()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "pending");

        let (status, _) = app
            .json("POST", "/api/projects/01001/schedule/tasks", Some(task))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, updated) = app
            .json(
                "PUT",
                "/api/projects/01001/schedule/tasks/T1",
                Some(json!({"status": "done"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "done");
        assert_eq!(updated["start_date"], "2025-05-01");

        let (status, _) = app
            .json(
                "PUT",
                "/api/projects/01001/schedule/tasks/T9",
                Some(json!({"status": "done"})),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // DB rows now shadow the filesystem
        let (_, body) = app.json("GET", "/api/projects/01001/schedule", None).await;
        assert_ne!(body["tasks"][0]["id"], 0);
    }
}
