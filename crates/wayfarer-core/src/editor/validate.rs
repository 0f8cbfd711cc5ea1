//! Itinerary validation.
//!
//! Produces a report of issues without mutating anything. Error-severity
//! issues (overlaps, closed POIs) make the report invalid; warnings
//! (window overruns, walking distance, budget) do not.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use wayfarer_db::models::{ItineraryItem, TravelMode};
use wayfarer_db::queries::{items, trips};

use crate::catalog::{HoursSpec, PoiCatalog};
use crate::error::{EngineError, EngineResult};
use crate::timegeo::{weekday_key, TimeOfDay};

/// Kind of validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    TimeConflict,
    OpeningHours,
    TimeWindow,
    Distance,
    Budget,
}

/// Severity of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// One finding from the validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: IssueSeverity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// The validator's output: issue list plus an overall verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True when no error-severity issue was found.
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let valid = !issues.iter().any(|i| i.severity == IssueSeverity::Error);
        Self { valid, issues }
    }
}

/// Validate the current itinerary of a trip.
pub async fn validate(
    pool: &PgPool,
    catalog: &dyn PoiCatalog,
    trip_id: Uuid,
) -> EngineResult<ValidationReport> {
    let prefs = trips::get_preferences(pool, trip_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("preferences for trip {trip_id}")))?;
    let window_start: TimeOfDay = prefs
        .window_start
        .parse()
        .map_err(|e| EngineError::Validation(format!("daily window start: {e}")))?;
    let window_end: TimeOfDay = prefs
        .window_end
        .parse()
        .map_err(|e| EngineError::Validation(format!("daily window end: {e}")))?;

    let all_items = items::list_items_for_trip(pool, trip_id).await?;
    let mut by_day: HashMap<i32, Vec<&ItineraryItem>> = HashMap::new();
    for item in &all_items {
        by_day.entry(item.day).or_default().push(item);
    }

    let mut issues: Vec<ValidationIssue> = Vec::new();
    let mut total_cost = 0.0f64;

    let mut days: Vec<i32> = by_day.keys().copied().collect();
    days.sort_unstable();

    for day in days {
        let day_items = &by_day[&day];
        let weekday = weekday_key(prefs.date_of_day(day));

        let mut previous_end: Option<(TimeOfDay, &ItineraryItem)> = None;
        let mut walking_km = 0.0f64;
        let mut day_cost = 0.0f64;

        for item in day_items {
            let start: TimeOfDay = match item.start_time.parse() {
                Ok(t) => t,
                Err(e) => {
                    issues.push(ValidationIssue {
                        issue_type: IssueType::TimeConflict,
                        severity: IssueSeverity::Error,
                        message: format!("item {:?} has an unparseable start time: {e}", item.name),
                        item_id: Some(item.id),
                        suggestion: None,
                    });
                    continue;
                }
            };
            let end: TimeOfDay = match item.end_time.parse() {
                Ok(t) => t,
                Err(e) => {
                    issues.push(ValidationIssue {
                        issue_type: IssueType::TimeConflict,
                        severity: IssueSeverity::Error,
                        message: format!("item {:?} has an unparseable end time: {e}", item.name),
                        item_id: Some(item.id),
                        suggestion: None,
                    });
                    continue;
                }
            };

            // Overlap with the previous item of the day.
            if let Some((prev_end, prev_item)) = previous_end {
                if start < prev_end {
                    issues.push(ValidationIssue {
                        issue_type: IssueType::TimeConflict,
                        severity: IssueSeverity::Error,
                        message: format!(
                            "{:?} starts at {start} before {:?} ends at {prev_end} on day {day}",
                            item.name, prev_item.name
                        ),
                        item_id: Some(item.id),
                        suggestion: Some("reorder the day or shift the start time".into()),
                    });
                }
            }
            previous_end = Some((end, *item));

            // Opening hours for POI-backed items.
            if let Some(poi_id) = item.poi_id {
                if let Some(poi) = catalog.get(poi_id).await? {
                    match poi.hours.on(weekday) {
                        HoursSpec::Closed => issues.push(ValidationIssue {
                            issue_type: IssueType::OpeningHours,
                            severity: IssueSeverity::Error,
                            message: format!("{:?} is closed on {weekday}", poi.name),
                            item_id: Some(item.id),
                            suggestion: Some("move the visit to another day".into()),
                        }),
                        HoursSpec::Open(hours) => {
                            if start < hours.open || end > hours.close {
                                issues.push(ValidationIssue {
                                    issue_type: IssueType::OpeningHours,
                                    severity: IssueSeverity::Error,
                                    message: format!(
                                        "{:?} is scheduled {start}-{end} but opens {}-{} on {weekday}",
                                        poi.name, hours.open, hours.close
                                    ),
                                    item_id: Some(item.id),
                                    suggestion: Some("shift the visit inside opening hours".into()),
                                });
                            }
                        }
                        HoursSpec::Unknown => {}
                    }
                }
            }

            // Daily window.
            if start < window_start || end > window_end {
                issues.push(ValidationIssue {
                    issue_type: IssueType::TimeWindow,
                    severity: IssueSeverity::Warning,
                    message: format!(
                        "{:?} ({start}-{end}) falls outside the daily window {window_start}-{window_end}",
                        item.name
                    ),
                    item_id: Some(item.id),
                    suggestion: None,
                });
            }

            if let Some(route) = &item.route_from_previous {
                if route.mode == TravelMode::Walking {
                    walking_km += route.distance_km;
                }
            }
            if let Some(cost) = &item.cost_estimate {
                day_cost += cost.amount;
            }
        }

        if let Some(max_walking) = prefs.constraints.max_walking_km_per_day {
            if walking_km > max_walking {
                issues.push(ValidationIssue {
                    issue_type: IssueType::Distance,
                    severity: IssueSeverity::Warning,
                    message: format!(
                        "day {day} walks {walking_km:.1} km, over the {max_walking:.1} km limit"
                    ),
                    item_id: None,
                    suggestion: Some("switch some legs to transit or taxi".into()),
                });
            }
        }

        if let Some(budget) = &prefs.budget {
            if let Some(per_day) = budget.per_day {
                if day_cost > per_day {
                    issues.push(ValidationIssue {
                        issue_type: IssueType::Budget,
                        severity: IssueSeverity::Warning,
                        message: format!(
                            "day {day} is estimated at {day_cost:.0} {}, over the {per_day:.0} daily budget",
                            budget.currency
                        ),
                        item_id: None,
                        suggestion: None,
                    });
                }
            }
        }

        total_cost += day_cost;
    }

    if let Some(budget) = &prefs.budget {
        if let Some(total) = budget.total {
            if total_cost > total {
                issues.push(ValidationIssue {
                    issue_type: IssueType::Budget,
                    severity: IssueSeverity::Warning,
                    message: format!(
                        "trip is estimated at {total_cost:.0} {}, over the {total:.0} budget",
                        budget.currency
                    ),
                    item_id: None,
                    suggestion: Some("drop or swap the most expensive items".into()),
                });
            }
        }
    }

    Ok(ValidationReport::from_issues(issues))
}
