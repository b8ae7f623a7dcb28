//! Create post view table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PostView::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PostView::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PostView::PostId).string_len(32).not_null())
                    .col(ColumnDef::new(PostView::UserId).string_len(32))
                    .col(
                        ColumnDef::new(PostView::ViewedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(PostView::Duration).integer())
                    .col(ColumnDef::new(PostView::Source).string_len(64))
                    .col(ColumnDef::new(PostView::IpAddress).string_len(64))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_post_view_post")
                            .from(PostView::Table, PostView::PostId)
                            .to(Post::Table, Post::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_post_view_user")
                            .from(PostView::Table, PostView::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (post_id, viewed_at) (analytics windows)
        manager
            .create_index(
                Index::create()
                    .name("idx_post_view_post_viewed_at")
                    .table(PostView::Table)
                    .col(PostView::PostId)
                    .col(PostView::ViewedAt)
                    .to_owned(),
            )
            .await?;

        // Index: (post_id, user_id) (24h deduplication lookups)
        manager
            .create_index(
                Index::create()
                    .name("idx_post_view_post_user")
                    .table(PostView::Table)
                    .col(PostView::PostId)
                    .col(PostView::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PostView::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PostView {
    Table,
    Id,
    PostId,
    UserId,
    ViewedAt,
    Duration,
    Source,
    IpAddress,
}

#[derive(Iden)]
enum Post {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
