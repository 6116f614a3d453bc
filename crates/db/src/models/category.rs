use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set, TransactionSession, TransactionTrait,
};
use sea_orm::sea_query::Expr;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utils_core::{response::ErrorDetails, serde_helpers::deserialize_some};
use uuid::Uuid;

use super::{
    ids,
    validation::{check_color, check_length, finish},
};
use crate::entities::{category, task};

#[derive(Debug, Error)]
pub enum CategoryError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Category not found")]
    CategoryNotFound,
    #[error("Profile not found")]
    ProfileNotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategory {
    pub profile_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_some"
    )]
    #[ts(optional)]
    pub color: Option<Option<String>>,
}

impl CreateCategory {
    pub fn validate(&self) -> Result<(), ErrorDetails> {
        let mut details = ErrorDetails::new();
        check_length(&mut details, "name", "Category name", &self.name, 50);
        check_color(&mut details, "color", self.color.as_deref());
        finish(details)
    }
}

impl UpdateCategory {
    pub fn validate(&self) -> Result<(), ErrorDetails> {
        let mut details = ErrorDetails::new();
        if let Some(name) = &self.name {
            check_length(&mut details, "name", "Category name", name, 50);
        }
        check_color(&mut details, "color", self.color.as_ref().and_then(|c| c.as_deref()));
        finish(details)
    }
}

impl Category {
    fn from_model(model: category::Model, profile_id: Uuid) -> Self {
        Self {
            id: model.uuid,
            profile_id,
            name: model.name,
            color: model.color,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    async fn resolve<C: ConnectionTrait>(db: &C, model: category::Model) -> Result<Self, DbErr> {
        let profile_id = ids::profile_uuid_by_id(db, model.profile_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Profile not found".to_string()))?;
        Ok(Self::from_model(model, profile_id))
    }

    pub async fn find_by_profile_id<C: ConnectionTrait>(
        db: &C,
        profile_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(profile_row_id) = ids::profile_id_by_uuid(db, profile_id).await? else {
            return Ok(Vec::new());
        };
        let records = category::Entity::find()
            .filter(category::Column::ProfileId.eq(profile_row_id))
            .order_by_asc(category::Column::Name)
            .order_by_asc(category::Column::Id)
            .all(db)
            .await?;
        Ok(records
            .into_iter()
            .map(|model| Self::from_model(model, profile_id))
            .collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = category::Entity::find()
            .filter(category::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::resolve(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateCategory,
        category_id: Uuid,
    ) -> Result<Self, CategoryError> {
        let profile_row_id = ids::profile_id_by_uuid(db, data.profile_id)
            .await?
            .ok_or(CategoryError::ProfileNotFound)?;

        let now = Utc::now();
        let active = category::ActiveModel {
            uuid: Set(category_id),
            profile_id: Set(profile_row_id),
            name: Set(data.name.trim().to_string()),
            color: Set(data.color.clone()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model, data.profile_id))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        data: &UpdateCategory,
    ) -> Result<Self, CategoryError> {
        let record = category::Entity::find()
            .filter(category::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(CategoryError::CategoryNotFound)?;

        let mut active: category::ActiveModel = record.into();
        if let Some(name) = &data.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(color) = &data.color {
            active.color = Set(color.clone());
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::resolve(db, updated).await?)
    }

    /// Tasks in the category survive with no category.
    pub async fn delete<C>(db: &C, id: Uuid) -> Result<u64, DbErr>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let tx = db.begin().await?;
        let Some(row_id) = ids::category_id_by_uuid(&tx, id).await? else {
            return Ok(0);
        };

        let detached = task::Entity::update_many()
            .col_expr(task::Column::CategoryId, Expr::value(None::<i64>))
            .filter(task::Column::CategoryId.eq(row_id))
            .exec(&tx)
            .await?;
        let result = category::Entity::delete_many()
            .filter(category::Column::Id.eq(row_id))
            .exec(&tx)
            .await?;
        tx.commit().await?;

        tracing::debug!(
            category_id = %id,
            detached_tasks = detached.rows_affected,
            "category deleted"
        );
        Ok(result.rows_affected)
    }
}
