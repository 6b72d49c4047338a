use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::constants::RECENT_ACTIVITY_DAYS;
use crate::error::AppError;
use crate::models::{
    AnalysisResult, DashboardStats, HistoryEntry, Impact, ItemPatch, ItemStatus, ItemType,
    Likelihood, Priority, RaidItem, TrackedItem,
};

const SYSTEM_ACTOR: &str = "system";

/// Transient RAID register. Nothing here survives a restart.
pub struct ItemStore {
    items: RwLock<Vec<TrackedItem>>,
}

pub fn severity_score(impact: Impact, likelihood: Likelihood) -> u32 {
    impact.weight() * likelihood.weight()
}

impl ItemStore {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }

    pub async fn create_item(&self, new: RaidItem) -> Result<TrackedItem, AppError> {
        if new.title.trim().is_empty() {
            return Err(AppError::InvalidInput("title must not be empty".to_string()));
        }

        let now = Utc::now();
        let item = TrackedItem {
            id: Uuid::new_v4().to_string(),
            item_type: new.item_type,
            title: new.title,
            description: new.description,
            status: new.status,
            priority: new.priority,
            impact: new.impact,
            likelihood: new.likelihood,
            severity_score: severity_score(new.impact, new.likelihood),
            workstream: new.workstream,
            owner: new.owner,
            due_date: new.due_date,
            created_at: now,
            updated_at: now,
            history: vec![history(now, "created", None)],
            ai: None,
        };
        self.items.write().await.push(item.clone());
        Ok(item)
    }

    pub async fn get_item(&self, id: &str) -> Result<TrackedItem, AppError> {
        self.items
            .read()
            .await
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    pub async fn list_items(&self) -> Vec<TrackedItem> {
        self.items.read().await.clone()
    }

    pub async fn update_item(&self, id: &str, patch: ItemPatch) -> Result<TrackedItem, AppError> {
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(AppError::InvalidInput("title must not be empty".to_string()));
        }

        let mut items = self.items.write().await;
        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(AppError::NotFound)?;

        let mut changed: Vec<&str> = Vec::new();
        macro_rules! apply {
            ($field:ident, $name:literal) => {
                if let Some(value) = patch.$field {
                    if item.$field != value {
                        item.$field = value;
                        changed.push($name);
                    }
                }
            };
        }
        apply!(item_type, "type");
        apply!(title, "title");
        apply!(description, "description");
        apply!(status, "status");
        apply!(priority, "priority");
        apply!(impact, "impact");
        apply!(likelihood, "likelihood");
        apply!(workstream, "workstream");
        apply!(owner, "owner");
        if let Some(due) = patch.due_date {
            if item.due_date.as_deref() != Some(due.as_str()) {
                item.due_date = Some(due);
                changed.push("dueDate");
            }
        }

        let now = Utc::now();
        item.severity_score = severity_score(item.impact, item.likelihood);
        item.updated_at = now;
        if !changed.is_empty() {
            let note = format!("Changed: {}", changed.join(", "));
            item.history.push(history(now, "updated", Some(note)));
        }
        Ok(item.clone())
    }

    pub async fn delete_item(&self, id: &str) -> Result<TrackedItem, AppError> {
        let mut items = self.items.write().await;
        let index = items
            .iter()
            .position(|i| i.id == id)
            .ok_or(AppError::NotFound)?;
        Ok(items.remove(index))
    }

    /// Store the latest AI result on an item.
    pub async fn attach_analysis(
        &self,
        id: &str,
        result: AnalysisResult,
    ) -> Result<TrackedItem, AppError> {
        let mut items = self.items.write().await;
        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(AppError::NotFound)?;
        let now = Utc::now();
        let note = result.provider_used.clone();
        item.ai = Some(result);
        item.history.push(history(now, "analyzed", note));
        Ok(item.clone())
    }

    pub async fn dashboard_stats(&self) -> DashboardStats {
        self.dashboard_stats_at(Utc::now()).await
    }

    async fn dashboard_stats_at(&self, now: DateTime<Utc>) -> DashboardStats {
        let items = self.items.read().await;

        let mut by_type: BTreeMap<String, usize> = ItemType::ALL
            .iter()
            .map(|t| (t.as_str().to_string(), 0))
            .collect();
        let mut by_status: BTreeMap<String, usize> = ItemStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        let mut by_priority: BTreeMap<String, usize> = Priority::ALL
            .iter()
            .map(|p| (p.as_str().to_string(), 0))
            .collect();

        let recent_cutoff = now - Duration::days(RECENT_ACTIVITY_DAYS);
        let today = now.date_naive();
        let mut recent_activity = 0;
        let mut overdue = 0;
        let mut active_items = 0;

        for item in items.iter() {
            *by_type.entry(item.item_type.as_str().to_string()).or_default() += 1;
            *by_status.entry(item.status.as_str().to_string()).or_default() += 1;
            *by_priority.entry(item.priority.as_str().to_string()).or_default() += 1;

            if item.updated_at >= recent_cutoff {
                recent_activity += 1;
            }
            if !item.status.is_finished() {
                active_items += 1;
                let due = item.due_date.as_deref().and_then(parse_due_date);
                if due.is_some_and(|d| d < today) {
                    overdue += 1;
                }
            }
        }

        DashboardStats {
            total: items.len(),
            by_type,
            by_status,
            by_priority,
            recent_activity,
            overdue,
            active_items,
        }
    }
}

impl Default for ItemStore {
    fn default() -> Self {
        Self::new()
    }
}

fn history(timestamp: DateTime<Utc>, action: &str, note: Option<String>) -> HistoryEntry {
    HistoryEntry {
        id: Uuid::new_v4().to_string(),
        timestamp,
        actor: SYSTEM_ACTOR.to_string(),
        action: action.to_string(),
        note,
    }
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates.
fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
}
