use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::category::{
    DEFAULT_CATEGORY_LIMIT, DEFAULT_EXPENSE_CATEGORY, DEFAULT_INCOME_CATEGORY, EntryType,
    UserDefaults,
};
use crate::models::currency::{CurrencyResponse, DEFAULT_CURRENCY};
use crate::validation::{validate_not_blank, validate_timezone, validate_timezone_or_blank};

/// User entity representing a registered user in the system
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub fname: String,
    pub lname: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Fixed at registration
    pub category_limit: i32,
    pub default_income_categories: Vec<String>,
    pub default_expense_categories: Vec<String>,
    /// IANA time zone used to decide what "today" means for the user
    pub timezone: Option<String>,
    /// ISO 4217 code
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Configured fallback category name for `entry_type`, if any
    pub fn default_category_name(&self, entry_type: EntryType) -> Option<&str> {
        let names = match entry_type {
            EntryType::Income => &self.default_income_categories,
            EntryType::Expense => &self.default_expense_categories,
        };
        names
            .first()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
    }

    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{} {}", self.fname, self.lname).trim().to_string(),
        }
    }

    /// Resolves a profile update against the stored values.
    ///
    /// A `name` that still reads "fname lname" follows the new first and last
    /// name; a custom one is kept. A blank timezone clears it.
    pub fn profile_changes(&self, request: &UpdateProfileRequest) -> ProfileChanges {
        let fname = request
            .fname
            .as_deref()
            .map(str::trim)
            .unwrap_or(self.fname.as_str())
            .to_string();
        let lname = request
            .lname
            .as_deref()
            .map(str::trim)
            .unwrap_or(self.lname.as_str())
            .to_string();

        let generated = format!("{} {}", self.fname, self.lname);
        let name = match self.name.as_deref().map(str::trim) {
            Some(name) if name == generated.trim() => Some(format!("{} {}", fname, lname)),
            _ => self.name.clone(),
        };

        let timezone = match request.timezone.as_deref().map(str::trim) {
            None => self.timezone.clone(),
            Some("") => None,
            Some(tz) => Some(tz.to_string()),
        };

        ProfileChanges {
            name,
            fname,
            lname,
            timezone,
        }
    }

    pub fn defaults(&self) -> UserDefaults {
        UserDefaults {
            default_income_categories: self.default_income_categories.clone(),
            default_expense_categories: self.default_expense_categories.clone(),
        }
    }
}

/// Data needed to insert a user; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: Option<String>,
    pub fname: String,
    pub lname: String,
    pub email: String,
    pub password_hash: String,
    pub timezone: Option<String>,
}

impl NewUser {
    /// Materialize the user with registration-time defaults
    pub fn into_user(self) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: self.name,
            fname: self.fname,
            lname: self.lname,
            email: self.email,
            password_hash: self.password_hash,
            category_limit: DEFAULT_CATEGORY_LIMIT,
            default_income_categories: vec![DEFAULT_INCOME_CATEGORY.to_string()],
            default_expense_categories: vec![DEFAULT_EXPENSE_CATEGORY.to_string()],
            timezone: self.timezone,
            currency: DEFAULT_CURRENCY.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// User as exposed by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub fname: String,
    pub lname: String,
    pub email: String,
    pub category_limit: i32,
    pub default_income_categories: Vec<String>,
    pub default_expense_categories: Vec<String>,
    pub timezone: Option<String>,
    pub currency: Option<CurrencyResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        let name = user.display_name();
        Self {
            id: user.id,
            name,
            fname: user.fname,
            lname: user.lname,
            email: user.email,
            category_limit: user.category_limit,
            default_income_categories: user.default_income_categories,
            default_expense_categories: user.default_expense_categories,
            timezone: user.timezone,
            currency: CurrencyResponse::from_code(&user.currency),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Request payload for user registration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "fname": "John",
    "lname": "Doe",
    "email": "john.doe@example.com",
    "password": "securepassword123",
    "timezone": "America/New_York"
}))]
pub struct CreateUserRequest {
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    #[validate(custom(function = "validate_not_blank"))]
    pub fname: String,

    #[validate(custom(function = "validate_not_blank"))]
    pub lname: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(custom(function = "validate_timezone"))]
    pub timezone: Option<String>,
}

/// Request payload for editing the current user; absent fields are kept
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "fname": "Jane",
    "lname": "Doe",
    "timezone": "Europe/London"
}))]
pub struct UpdateProfileRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub fname: Option<String>,

    #[validate(custom(function = "validate_not_blank"))]
    pub lname: Option<String>,

    /// IANA zone; an empty string clears it
    #[validate(custom(function = "validate_timezone_or_blank"))]
    pub timezone: Option<String>,
}

impl UpdateProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.fname.is_none() && self.lname.is_none() && self.timezone.is_none()
    }
}

/// Resolved profile columns to store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub fname: String,
    pub lname: String,
    pub timezone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user() -> NewUser {
        NewUser {
            name: None,
            fname: "Ada".to_string(),
            lname: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "hash".to_string(),
            timezone: None,
        }
    }

    #[test]
    fn test_into_user_applies_registration_defaults() {
        let user = new_user().into_user();
        assert_eq!(user.category_limit, 10);
        assert_eq!(user.default_category_name(EntryType::Income), Some("Sales"));
        assert_eq!(user.default_category_name(EntryType::Expense), Some("Stock"));
    }

    #[test]
    fn test_display_name_falls_back_to_first_and_last() {
        let mut user = new_user().into_user();
        assert_eq!(user.display_name(), "Ada Lovelace");

        user.name = Some("Countess".to_string());
        assert_eq!(user.display_name(), "Countess");
    }

    #[test]
    fn test_profile_hides_password_hash() {
        let user = new_user().into_user();
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_create_user_request_validation() {
        let request = CreateUserRequest {
            name: None,
            fname: " ".to_string(),
            lname: "Doe".to_string(),
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            timezone: Some("Mars/Olympus".to_string()),
        };

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("fname"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("timezone"));
    }

    #[test]
    fn test_new_user_gets_default_currency() {
        let user = new_user().into_user();
        assert_eq!(user.currency, "USD");

        let profile = UserProfile::from(user);
        assert_eq!(profile.currency.unwrap().code, "USD");
    }

    #[test]
    fn test_profile_changes_follow_generated_name() {
        let mut user = new_user().into_user();
        user.name = Some("Ada Lovelace".to_string());
        user.timezone = Some("Europe/London".to_string());

        let changes = user.profile_changes(&UpdateProfileRequest {
            fname: Some("  Augusta ".to_string()),
            lname: None,
            timezone: Some(String::new()),
        });
        assert_eq!(
            changes,
            ProfileChanges {
                name: Some("Augusta Lovelace".to_string()),
                fname: "Augusta".to_string(),
                lname: "Lovelace".to_string(),
                timezone: None,
            }
        );

        user.name = Some("Countess".to_string());
        let changes = user.profile_changes(&UpdateProfileRequest {
            lname: Some("King".to_string()),
            timezone: Some("Asia/Tokyo".to_string()),
            ..Default::default()
        });
        assert_eq!(changes.name.as_deref(), Some("Countess"));
        assert_eq!(changes.fname, "Ada");
        assert_eq!(changes.lname, "King");
        assert_eq!(changes.timezone.as_deref(), Some("Asia/Tokyo"));
    }

    #[test]
    fn test_update_profile_request_validation() {
        let request = UpdateProfileRequest {
            fname: Some("   ".to_string()),
            lname: None,
            timezone: Some("Mars/Olympus".to_string()),
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("fname"));
        assert!(fields.contains_key("timezone"));
        assert!(!fields.contains_key("lname"));

        let clearing = UpdateProfileRequest {
            timezone: Some(String::new()),
            ..Default::default()
        };
        assert!(clearing.validate().is_ok());
        assert!(UpdateProfileRequest::default().is_empty());
    }
}
