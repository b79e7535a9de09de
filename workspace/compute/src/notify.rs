//! Outgoing notifications.
//!
//! The workflows only decide *who* is told *what*; rendering and delivery
//! belong to a [`Notifier`] implementation supplied by the caller.

use async_trait::async_trait;
use common::AttendanceStats;
use model::entities::user;
use thiserror::Error;

/// Addressee of a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub email: String,
    pub name: String,
}

impl From<&user::Model> for Recipient {
    fn from(user: &user::Model) -> Self {
        Self {
            email: user.email.clone(),
            name: user.full_name(),
        }
    }
}

/// A templated message together with the data it is rendered from.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// The administrator request of the recipient was approved.
    AdminApproved,
    /// A course the recipient was enrolled in has been closed.
    CourseCompleted {
        course_name: String,
        school_name: String,
        stats: AttendanceStats,
    },
}

impl Notification {
    pub fn template(&self) -> &'static str {
        match self {
            Self::AdminApproved => "admin_approved",
            Self::CourseCompleted { .. } => "course_completed",
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Invalid address: {0}")]
    Address(String),

    #[error("Could not build message: {0}")]
    Message(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        recipient: &Recipient,
        notification: &Notification,
    ) -> Result<(), NotifyError>;
}
