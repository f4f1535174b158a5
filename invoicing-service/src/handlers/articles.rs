use crate::models::{Article, ArticleUpdate, CreateArticle};
use crate::services::TenantTx;
use crate::utils::{AppJson, AppPath};
use axum::{http::StatusCode, Json};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

/// Batch create. The body is a JSON array of articles.
pub async fn create_articles(
    mut tx: TenantTx,
    AppJson(inputs): AppJson<Vec<CreateArticle>>,
) -> Result<(StatusCode, Json<Vec<Article>>), AppError> {
    for input in &inputs {
        input.validate()?;
    }
    let articles = tx.create_articles(&inputs).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(articles)))
}

pub async fn get_article(
    AppPath(article_id): AppPath<Uuid>,
    mut tx: TenantTx,
) -> Result<Json<Article>, AppError> {
    let article = tx.get_article(article_id).await?;
    tx.commit().await?;
    Ok(Json(article))
}

pub async fn update_article(
    AppPath(article_id): AppPath<Uuid>,
    mut tx: TenantTx,
    AppJson(update): AppJson<ArticleUpdate>,
) -> Result<Json<Article>, AppError> {
    let article: Article = tx.apply_patch(article_id, &update).await?;
    tx.commit().await?;
    Ok(Json(article))
}
