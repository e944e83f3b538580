//! Group domain models for gift exchange groups.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::membership::Membership;

/// Draw status of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    /// No valid draw exists. Membership may change freely.
    Created,
    /// A complete assignment set exists for the current members.
    Drawn,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Created => "created",
            GroupStatus::Drawn => "drawn",
        }
    }

    pub fn is_drawn(&self) -> bool {
        matches!(self, GroupStatus::Drawn)
    }
}

impl FromStr for GroupStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "created" => Ok(GroupStatus::Created),
            "drawn" => Ok(GroupStatus::Drawn),
            _ => Err(format!("Invalid group status: {}", s)),
        }
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A gift exchange group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub event_date: Option<NaiveDate>,
    /// Price ceiling for gifts, always positive.
    pub max_price: Decimal,
    /// Sole authority for owner-only operations.
    pub owner_id: Uuid,
    pub status: GroupStatus,
    pub drawn_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    pub fn is_owner(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }
}

/// Data needed to insert a group row.
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    pub description: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub max_price: Decimal,
    pub owner_id: Uuid,
}

/// Field changes applied by an owner update.
#[derive(Debug, Clone, Default)]
pub struct GroupChanges {
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub event_date: Option<NaiveDate>,
    pub max_price: Option<Decimal>,
}

impl GroupChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.event_date.is_none()
            && self.max_price.is_none()
    }
}

/// Group names are 1 to 100 characters once surrounding whitespace is trimmed.
pub fn validate_group_name(name: &str) -> Result<(), ValidationError> {
    let length = name.trim().chars().count();
    if (1..=100).contains(&length) {
        Ok(())
    } else {
        let mut err = ValidationError::new("name_length");
        err.message = Some("Name must be between 1 and 100 characters".into());
        Err(err)
    }
}

/// Trimmed description, or None when nothing but whitespace was sent.
fn clean_description(description: String) -> Option<String> {
    let trimmed = description.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Rejects zero and negative price ceilings.
pub fn validate_max_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_positive() && !price.is_zero() {
        Ok(())
    } else {
        let mut err = ValidationError::new("max_price_positive");
        err.message = Some("Max price must be greater than zero".into());
        Err(err)
    }
}

/// Request payload for creating a group.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateGroupRequest {
    #[validate(custom(function = "validate_group_name"))]
    pub name: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    pub event_date: Option<NaiveDate>,

    #[validate(custom(function = "validate_max_price"))]
    pub max_price: Decimal,
}

impl CreateGroupRequest {
    pub fn into_new_group(self, owner_id: Uuid) -> NewGroup {
        NewGroup {
            name: self.name.trim().to_string(),
            description: self.description.and_then(clean_description),
            event_date: self.event_date,
            max_price: self.max_price,
            owner_id,
        }
    }
}

/// Request payload for updating a group.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct UpdateGroupRequest {
    #[validate(custom(function = "validate_group_name"))]
    pub name: Option<String>,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    pub event_date: Option<NaiveDate>,

    #[validate(custom(function = "validate_max_price"))]
    pub max_price: Option<Decimal>,
}

impl From<UpdateGroupRequest> for GroupChanges {
    fn from(request: UpdateGroupRequest) -> Self {
        Self {
            name: request.name.map(|n| n.trim().to_string()),
            description: request.description.map(clean_description),
            event_date: request.event_date,
            max_price: request.max_price,
        }
    }
}

/// Row in the caller's group list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct GroupSummary {
    pub id: Uuid,
    pub name: String,
    pub event_date: Option<NaiveDate>,
    pub max_price: Decimal,
    pub status: GroupStatus,
    pub member_count: i64,
    pub is_owner: bool,
}

/// Group as seen by one of its members. Never carries assignments.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: Group,
    pub members: Vec<Membership>,
    pub my_membership_id: Uuid,
    pub is_owner: bool,
}
