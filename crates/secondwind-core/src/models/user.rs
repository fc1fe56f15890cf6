use serde::{Deserialize, Serialize};

/// The signed-in runner, as returned by `GET /my`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub nickname_image: Option<String>,
    pub runner_grade: Option<String>,
    pub crew_id: Option<i64>,
    pub crew_name: Option<String>,
    /// Remaining fields, kept so nothing the backend sends is lost
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        match self.nickname.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!("Runner #{}", self.id),
        }
    }

    pub fn has_crew(&self) -> bool {
        self.crew_id.is_some()
    }
}
