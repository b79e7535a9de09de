//! Fixtures shared by the workflow tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use migration::{Migrator, MigratorTrait};
use model::entities::{
    attendance::{self, AttendanceStatus},
    class, course,
    course::CourseState,
    course_teacher, payment,
    payment::PaymentStatus,
    school,
    user::{self, Role, UserState},
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Set};
use uuid::Uuid;

use crate::notify::{Notification, Notifier, NotifyError, Recipient};
use crate::payment::{GatewayError, PaymentGateway, Preference, PreferenceRequest, ProviderPayment};

static SEQ: AtomicU64 = AtomicU64::new(0);

fn next() -> u64 {
    SEQ.fetch_add(1, Ordering::SeqCst)
}

pub async fn setup_db() -> DatabaseConnection {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let db = Database::connect("sqlite::memory:").await.unwrap();
    db.execute_unprepared("PRAGMA foreign_keys = ON")
        .await
        .unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

pub async fn new_user(db: &DatabaseConnection, role: Role, birth_date: NaiveDate) -> user::Model {
    let n = next();
    let now = Utc::now();
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(format!("User{n}")),
        lastname: Set("Test".to_string()),
        email: Set(format!("user{n}@example.com")),
        password: Set("not-a-hash".to_string()),
        phone: Set("3000000000".to_string()),
        document_type: Set("CC".to_string()),
        document: Set(format!("{}", 1_000_000 + n)),
        birth_date: Set(birth_date),
        role: Set(role),
        state: Set(UserState::Active),
        pending_admin: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn new_school(db: &DatabaseConnection) -> school::Model {
    let n = next();
    let now = Utc::now();
    school::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(format!("Escuela {n}")),
        description: Set("Test school".to_string()),
        phone: Set("6011234567".to_string()),
        address: Set("Calle 1".to_string()),
        email: Set(format!("school{n}@example.com")),
        image: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn new_course(
    db: &DatabaseConnection,
    school: &school::Model,
    places: i32,
    age: i32,
) -> course::Model {
    let now = Utc::now();
    course::ActiveModel {
        id: Set(Uuid::new_v4()),
        school_id: Set(school.id),
        name: Set("Natación".to_string()),
        description: Set("Clases de natación".to_string()),
        price: Set(Decimal::new(100, 0)),
        places: Set(places),
        age: Set(age),
        image: Set(Some("courses/test.png".to_string())),
        course_state: Set(CourseState::Active),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn assign_teacher(
    db: &DatabaseConnection,
    course: &course::Model,
    teacher: &user::Model,
) {
    course_teacher::ActiveModel {
        course_id: Set(course.id),
        user_id: Set(teacher.id),
    }
    .insert(db)
    .await
    .unwrap();
}

pub async fn new_class(
    db: &DatabaseConnection,
    course: &course::Model,
    teacher: &user::Model,
    day: u32,
) -> class::Model {
    let now = Utc::now();
    let class_date: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 2, day, 10, 0, 0).unwrap();
    class::ActiveModel {
        id: Set(Uuid::new_v4()),
        course_id: Set(course.id),
        teacher_id: Set(teacher.id),
        title: Set(format!("Clase {day}")),
        description: Set(None),
        class_date: Set(class_date),
        duration: Set(60),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn mark(
    db: &DatabaseConnection,
    class: &class::Model,
    student: &user::Model,
    status: AttendanceStatus,
) {
    let now = Utc::now();
    attendance::ActiveModel {
        id: Set(Uuid::new_v4()),
        class_id: Set(class.id),
        user_id: Set(student.id),
        status: Set(status),
        notes: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap();
}

pub async fn new_pending_payment(
    db: &DatabaseConnection,
    user: &user::Model,
    course: &course::Model,
    amount: Decimal,
) -> payment::Model {
    let now = Utc::now();
    payment::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.id),
        course_id: Set(course.id),
        amount: Set(amount),
        status: Set(PaymentStatus::Pending),
        payment_method: Set("mercadopago".to_string()),
        description: Set("Inscripción".to_string()),
        provider_payment_id: Set(None),
        provider_payload: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
}

/// Keeps every notification instead of sending it. Addresses listed in
/// `failing` are refused.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Recipient, Notification)>>,
    pub failing: Vec<String>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        recipient: &Recipient,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        if self.failing.contains(&recipient.email) {
            return Err(NotifyError::Delivery("mailbox unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.clone(), notification.clone()));
        Ok(())
    }
}

/// Gateway answering from canned data.
#[derive(Default)]
pub struct FakeGateway {
    pub payments: Mutex<Vec<ProviderPayment>>,
    pub fail_preferences: bool,
    pub requests: Mutex<Vec<PreferenceRequest>>,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<Preference, GatewayError> {
        if self.fail_preferences {
            return Err(GatewayError::Rejected {
                status: 500,
                body: "boom".to_string(),
            });
        }
        self.requests.lock().unwrap().push(request.clone());
        Ok(Preference {
            id: format!("pref-{}", request.external_reference),
            checkout_url: format!("https://checkout.test/{}", request.external_reference),
        })
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<ProviderPayment, GatewayError> {
        self.payments
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == payment_id)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected {
                status: 404,
                body: "not found".to_string(),
            })
    }
}
