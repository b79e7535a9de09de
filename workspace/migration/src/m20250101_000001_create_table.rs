use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(uuid(Users::Id).primary_key())
                    .col(string(Users::Name))
                    .col(string(Users::Lastname))
                    .col(string(Users::Email).unique_key())
                    .col(string(Users::Password))
                    .col(string(Users::Phone))
                    .col(string_len(Users::DocumentType, 10))
                    .col(string_len(Users::Document, 30))
                    .col(date(Users::BirthDate))
                    .col(string_len(Users::Role, 20).default("student"))
                    .col(string_len(Users::State, 10).default("active"))
                    .col(boolean(Users::PendingAdmin).default(false))
                    .col(timestamp_with_time_zone(Users::CreatedAt))
                    .col(timestamp_with_time_zone(Users::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_users_document")
                    .table(Users::Table)
                    .col(Users::DocumentType)
                    .col(Users::Document)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create schools table
        manager
            .create_table(
                Table::create()
                    .table(Schools::Table)
                    .if_not_exists()
                    .col(uuid(Schools::Id).primary_key())
                    .col(string(Schools::Name))
                    .col(text(Schools::Description))
                    .col(string(Schools::Phone))
                    .col(string(Schools::Address))
                    .col(string(Schools::Email))
                    .col(string_null(Schools::Image))
                    .col(timestamp_with_time_zone(Schools::CreatedAt))
                    .col(timestamp_with_time_zone(Schools::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Create school_members table (join table)
        manager
            .create_table(
                Table::create()
                    .table(SchoolMembers::Table)
                    .if_not_exists()
                    .col(uuid(SchoolMembers::SchoolId))
                    .col(uuid(SchoolMembers::UserId))
                    .col(string_len(SchoolMembers::Role, 20))
                    .primary_key(
                        Index::create()
                            .name("pk_school_members")
                            .col(SchoolMembers::SchoolId)
                            .col(SchoolMembers::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_school_members_school")
                            .from(SchoolMembers::Table, SchoolMembers::SchoolId)
                            .to(Schools::Table, Schools::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_school_members_user")
                            .from(SchoolMembers::Table, SchoolMembers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create courses table
        manager
            .create_table(
                Table::create()
                    .table(Courses::Table)
                    .if_not_exists()
                    .col(uuid(Courses::Id).primary_key())
                    .col(uuid(Courses::SchoolId))
                    .col(string(Courses::Name))
                    .col(text(Courses::Description))
                    .col(decimal_len(Courses::Price, 12, 2))
                    .col(integer(Courses::Places))
                    .col(integer(Courses::Age))
                    .col(string_null(Courses::Image))
                    .col(string_len(Courses::CourseState, 10).default("active"))
                    .col(timestamp_with_time_zone(Courses::CreatedAt))
                    .col(timestamp_with_time_zone(Courses::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_courses_school")
                            .from(Courses::Table, Courses::SchoolId)
                            .to(Schools::Table, Schools::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create course_teachers table (join table)
        manager
            .create_table(
                Table::create()
                    .table(CourseTeachers::Table)
                    .if_not_exists()
                    .col(uuid(CourseTeachers::CourseId))
                    .col(uuid(CourseTeachers::UserId))
                    .primary_key(
                        Index::create()
                            .name("pk_course_teachers")
                            .col(CourseTeachers::CourseId)
                            .col(CourseTeachers::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_course_teachers_course")
                            .from(CourseTeachers::Table, CourseTeachers::CourseId)
                            .to(Courses::Table, Courses::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_course_teachers_user")
                            .from(CourseTeachers::Table, CourseTeachers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CourseTeachers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Courses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SchoolMembers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Schools::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Users {
    Table,
    Id,
    Name,
    Lastname,
    Email,
    Password,
    Phone,
    DocumentType,
    Document,
    BirthDate,
    Role,
    State,
    PendingAdmin,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Schools {
    Table,
    Id,
    Name,
    Description,
    Phone,
    Address,
    Email,
    Image,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SchoolMembers {
    Table,
    SchoolId,
    UserId,
    Role,
}

#[derive(DeriveIden)]
pub(crate) enum Courses {
    Table,
    Id,
    SchoolId,
    Name,
    Description,
    Price,
    Places,
    Age,
    Image,
    CourseState,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CourseTeachers {
    Table,
    CourseId,
    UserId,
}
