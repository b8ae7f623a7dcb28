//! Create quiz question table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(QuizQuestion::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QuizQuestion::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(QuizQuestion::PostId).string_len(32).not_null())
                    .col(ColumnDef::new(QuizQuestion::Question).text().not_null())
                    .col(
                        ColumnDef::new(QuizQuestion::Options)
                            .json_binary()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(QuizQuestion::CorrectAnswer)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(QuizQuestion::Points)
                            .integer()
                            .not_null()
                            .default(10),
                    )
                    .col(ColumnDef::new(QuizQuestion::Position).integer().not_null())
                    .col(ColumnDef::new(QuizQuestion::Explanation).text())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_quiz_question_post")
                            .from(QuizQuestion::Table, QuizQuestion::PostId)
                            .to(Post::Table, Post::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_quiz_question_post_position")
                    .table(QuizQuestion::Table)
                    .col(QuizQuestion::PostId)
                    .col(QuizQuestion::Position)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QuizQuestion::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum QuizQuestion {
    Table,
    Id,
    PostId,
    Question,
    Options,
    CorrectAnswer,
    Points,
    Position,
    Explanation,
}

#[derive(Iden)]
enum Post {
    Table,
    Id,
}
