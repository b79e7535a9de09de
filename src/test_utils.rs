#[cfg(test)]
pub mod test_utils {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::http::{HeaderName, HeaderValue, header::AUTHORIZATION};
    use axum_test::TestServer;
    use chrono::{NaiveDate, TimeZone, Utc};
    use compute::notify::{Notification, Notifier, NotifyError, Recipient};
    use compute::payment::{
        GatewayError, PaymentGateway, Preference, PreferenceRequest, ProviderPayment,
    };
    use migration::{Migrator, MigratorTrait};
    use model::entities::{
        class, course, course_teacher, school,
        school_member::{self, MembershipRole},
        user::{self, Role, UserState},
    };
    use rust_decimal::Decimal;
    use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Set};
    use uuid::Uuid;

    use crate::auth::{PasswordService, TokenService};
    use crate::config::{
        AppConfig, AuthConfig, DatabaseConfig, PaymentsConfig, ServerConfig, SmtpConfig,
        UploadsConfig,
    };
    use crate::router::create_router;
    use crate::schemas::AppState;

    pub const PASSWORD: &str = "secreto123";

    /// Keeps every notification instead of sending it.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(Recipient, Notification)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(
            &self,
            recipient: &Recipient,
            notification: &Notification,
        ) -> Result<(), NotifyError> {
            self.sent
                .lock()
                .unwrap()
                .push((recipient.clone(), notification.clone()));
            Ok(())
        }
    }

    impl RecordingNotifier {
        pub fn templates_sent_to(&self, email: &str) -> Vec<&'static str> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(r, _)| r.email == email)
                .map(|(_, n)| n.template())
                .collect()
        }
    }

    /// Gateway answering from canned provider payments.
    #[derive(Default)]
    pub struct FakeGateway {
        pub payments: Mutex<Vec<ProviderPayment>>,
        pub fail_preferences: Mutex<bool>,
    }

    impl FakeGateway {
        /// Makes the provider report `provider_id` as `status` for local payment `payment_id`.
        pub fn report(&self, provider_id: &str, payment_id: Uuid, status: &str, amount: Decimal) {
            let raw = serde_json::json!({
                "id": provider_id,
                "status": status,
                "external_reference": payment_id.to_string(),
                "transaction_amount": amount.to_string(),
            })
            .to_string();
            self.payments.lock().unwrap().push(ProviderPayment {
                id: provider_id.to_string(),
                status: status.to_string(),
                external_reference: Some(payment_id.to_string()),
                transaction_amount: Some(amount),
                raw,
            });
        }
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn create_preference(
            &self,
            request: &PreferenceRequest,
        ) -> Result<Preference, GatewayError> {
            if *self.fail_preferences.lock().unwrap() {
                return Err(GatewayError::Transport("connection refused".to_string()));
            }
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
                .rev()
                .find(|p| p.id == payment_id)
                .cloned()
                .ok_or_else(|| GatewayError::Rejected {
                    status: 404,
                    body: "not found".to_string(),
                })
        }
    }

    /// A running router together with the state and doubles behind it.
    pub struct TestApp {
        pub server: TestServer,
        pub state: AppState,
        pub notifier: Arc<RecordingNotifier>,
        pub gateway: Arc<FakeGateway>,
    }

    /// Create an in-memory SQLite database for testing
    pub async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");
        db.execute_unprepared("PRAGMA foreign_keys = ON")
            .await
            .expect("Failed to enable foreign keys");
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");
        db
    }

    fn test_config(upload_dir: String) -> AppConfig {
        AppConfig {
            server: ServerConfig {
                bind_address: "127.0.0.1:0".to_string(),
                request_timeout_secs: 30,
                max_body_bytes: 2 * 1024 * 1024,
            },
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            auth: AuthConfig {
                jwt_secret: "test-secret".to_string(),
                token_hours: 1,
                argon2_memory_kib: 8,
                argon2_iterations: 1,
            },
            uploads: UploadsConfig { dir: upload_dir },
            smtp: SmtpConfig {
                host: String::new(),
                port: 25,
                username: String::new(),
                password: String::new(),
                from: "Campus <test@campus.local>".to_string(),
            },
            payments: PaymentsConfig {
                base_url: "http://gateway.invalid".to_string(),
                access_token: "TEST".to_string(),
                currency: "COP".to_string(),
                success_url: "http://front.test/ok".to_string(),
                failure_url: "http://front.test/error".to_string(),
                pending_url: "http://front.test/pending".to_string(),
                notification_url: "http://api.test/api/payments/webhook".to_string(),
                timeout_secs: 5,
            },
        }
    }

    /// Initialize tracing for tests with output to STDERR, honoring `RUST_LOG`.
    fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Create AppState for testing
    pub async fn setup_test_app() -> TestApp {
        init_test_tracing();

        let db = setup_test_db().await;
        let upload_dir = std::env::temp_dir()
            .join(format!("campus-test-{}", Uuid::new_v4()))
            .to_string_lossy()
            .to_string();
        let config = test_config(upload_dir);

        let notifier = Arc::new(RecordingNotifier::default());
        let gateway = Arc::new(FakeGateway::default());
        let state = AppState {
            db,
            tokens: TokenService::new(&config.auth.jwt_secret, config.auth.token_hours),
            passwords: PasswordService::new(
                config.auth.argon2_memory_kib,
                config.auth.argon2_iterations,
            )
            .unwrap(),
            config: Arc::new(config),
            notifier: notifier.clone(),
            gateway: gateway.clone(),
        };

        let server = TestServer::new(create_router(state.clone())).unwrap();
        TestApp {
            server,
            state,
            notifier,
            gateway,
        }
    }

    pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
        (
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        )
    }

    impl TestApp {
        pub fn db(&self) -> &DatabaseConnection {
            &self.state.db
        }

        pub fn token(&self, user: &user::Model) -> String {
            self.state.tokens.issue(user).unwrap()
        }

        /// Authorization header for `user`.
        pub fn auth(&self, user: &user::Model) -> (HeaderName, HeaderValue) {
            bearer(&self.token(user))
        }

        pub async fn user(&self, role: Role) -> user::Model {
            self.user_born(role, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap())
                .await
        }

        pub async fn user_born(&self, role: Role, birth_date: NaiveDate) -> user::Model {
            let n = Uuid::new_v4().as_u128() % 1_000_000_000;
            let now = Utc::now();
            user::ActiveModel {
                id: Set(Uuid::new_v4()),
                name: Set(format!("Nombre{}", n % 1000)),
                lastname: Set(format!("Apellido{n}")),
                email: Set(format!("user{n}@example.com")),
                password: Set(self.state.passwords.hash(PASSWORD).unwrap()),
                phone: Set("3001234567".to_string()),
                document_type: Set("CC".to_string()),
                document: Set(n.to_string()),
                birth_date: Set(birth_date),
                role: Set(role),
                state: Set(UserState::Active),
                pending_admin: Set(false),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(self.db())
            .await
            .unwrap()
        }

        pub async fn school(&self) -> school::Model {
            let now = Utc::now();
            school::ActiveModel {
                id: Set(Uuid::new_v4()),
                name: Set("Escuela de Artes".to_string()),
                description: Set("Música y danza".to_string()),
                phone: Set("6017654321".to_string()),
                address: Set("Carrera 7 # 40-62".to_string()),
                email: Set("artes@example.com".to_string()),
                image: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(self.db())
            .await
            .unwrap()
        }

        pub async fn member(
            &self,
            school: &school::Model,
            user: &user::Model,
            role: MembershipRole,
        ) {
            school_member::ActiveModel {
                school_id: Set(school.id),
                user_id: Set(user.id),
                role: Set(role),
            }
            .insert(self.db())
            .await
            .unwrap();
        }

        pub async fn course(&self, school: &school::Model, places: i32, age: i32) -> course::Model {
            let now = Utc::now();
            course::ActiveModel {
                id: Set(Uuid::new_v4()),
                school_id: Set(school.id),
                name: Set("Guitarra".to_string()),
                description: Set("Guitarra para principiantes".to_string()),
                price: Set(Decimal::new(100, 0)),
                places: Set(places),
                age: Set(age),
                image: Set(None),
                course_state: Set(course::CourseState::Active),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(self.db())
            .await
            .unwrap()
        }

        pub async fn assign(&self, course: &course::Model, teacher: &user::Model) {
            course_teacher::ActiveModel {
                course_id: Set(course.id),
                user_id: Set(teacher.id),
            }
            .insert(self.db())
            .await
            .unwrap();
        }

        pub async fn class(
            &self,
            course: &course::Model,
            teacher: &user::Model,
            day: u32,
        ) -> class::Model {
            let now = Utc::now();
            class::ActiveModel {
                id: Set(Uuid::new_v4()),
                course_id: Set(course.id),
                teacher_id: Set(teacher.id),
                title: Set(format!("Sesión {day}")),
                description: Set(None),
                class_date: Set(Utc.with_ymd_and_hms(2024, 3, day, 15, 0, 0).unwrap()),
                duration: Set(90),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(self.db())
            .await
            .unwrap()
        }
    }
}
