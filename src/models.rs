use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

// ============================================================================
// Shared Models
// ============================================================================
//
// Identifiers and read models shared by every component. Catalog, identity
// and content records are owned by external collaborators; the core only
// reads them.
//
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// A registered user (student, instructor or admin)
    UserId
);
uuid_id!(
    /// A catalog course
    CourseId
);
uuid_id!(OrderId);
uuid_id!(OrderItemId);
uuid_id!(EnrollmentId);
uuid_id!(ChapterId);
uuid_id!(ContentId);

// ============================================================================
// Identity
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub role: Role,
}

/// Whoever is asking for content. Anonymous viewers carry no identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewer {
    pub user_id: Option<UserId>,
    pub role: Option<Role>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: UserId, role: Role) -> Self {
        Self {
            user_id: Some(user_id),
            role: Some(role),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }
}

impl From<&User> for Viewer {
    fn from(user: &User) -> Self {
        Self::user(user.id, user.role)
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub thumbnail: Option<String>,
    pub price: Decimal,
    pub is_active: bool,
    pub instructor_id: UserId,
}

// ============================================================================
// Content (chapters and lessons)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub course_id: CourseId,
    pub title: String,
    pub description: Option<String>,
    pub order_index: Option<i32>,
    pub document_url: Option<String>,
    pub video_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub id: ContentId,
    pub chapter_id: ChapterId,
    pub title: String,
    pub description: Option<String>,
    pub file_url: Option<String>,
    pub duration_minutes: Option<u32>,
    pub order_index: Option<i32>,
    pub is_preview: bool,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_distinct_and_display_as_uuid() {
        let a = CourseId::new();
        let b = CourseId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string(), a.as_uuid().to_string());
    }

    #[test]
    fn test_id_serializes_transparently() {
        let id = OrderId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
    }

    #[test]
    fn test_viewer_roles() {
        let admin = Viewer::user(UserId::new(), Role::Admin);
        let student = Viewer::user(UserId::new(), Role::Student);

        assert!(admin.is_admin());
        assert!(!student.is_admin());
        assert!(!Viewer::anonymous().is_admin());
        assert!(Viewer::anonymous().user_id.is_none());
    }

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Instructor).unwrap(), "\"INSTRUCTOR\"");
    }
}
