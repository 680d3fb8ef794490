use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Job posting as seen by the interview service. Written by the admin side; read-only here.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub company: String,
    pub description: String,
    pub focus_areas: Vec<String>,
    pub rubric: Option<Rubric>,
    pub admin_guide: Option<String>,
    pub screener_rules: Vec<ScreenerRule>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub company: String,
    pub description: String,
    pub focus_areas: Vec<String>,
    pub rubric: Option<Json<Rubric>>,
    pub admin_guide: Option<String>,
    pub screener_rules: Json<Vec<ScreenerRule>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        Job {
            id: row.id,
            code: row.code,
            title: row.title,
            company: row.company,
            description: row.description,
            focus_areas: row.focus_areas,
            rubric: row.rubric.map(|r| r.0),
            admin_guide: row.admin_guide,
            screener_rules: row.screener_rules.0,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    #[serde(default)]
    pub criteria: Vec<RubricCriterion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricCriterion {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
}

impl Rubric {
    /// One line per criterion, e.g. `- System design (weight 0.4): trade-offs, scaling`.
    pub fn hints(&self) -> String {
        self.criteria
            .iter()
            .map(|c| {
                let mut line = format!("- {}", c.name.trim());
                if let Some(weight) = c.weight {
                    line.push_str(&format!(" (weight {weight})"));
                }
                if let Some(desc) = c.description.as_deref().map(str::trim) {
                    if !desc.is_empty() {
                        line.push_str(": ");
                        line.push_str(desc);
                    }
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A qualifying question asked before the interview starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenerRule {
    pub question_id: String,
    pub question: String,
    #[serde(flatten)]
    pub condition: ScreenerCondition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScreenerCondition {
    /// Any non-empty answer passes.
    Required,
    YesNo { expected: bool },
    MinNumber { min: f64 },
    OneOf { options: Vec<String> },
}
