use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionSession, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utils_core::response::ErrorDetails;
use uuid::Uuid;

use super::{
    ids,
    profile::Profile,
    validation::{check_length, finish},
};
use crate::entities::{profile, user};

#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("User not found")]
    UserNotFound,
    #[error("A user with this email already exists")]
    DuplicateEmail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub name: Option<String>,
}

fn validate_email(email: &str, details: &mut ErrorDetails) {
    let email = email.trim();
    let well_formed = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty() && domain.contains('.') && !domain.ends_with('.')
    });
    if !well_formed {
        details.insert("email".to_string(), "Invalid email address".to_string());
    } else if email.len() > 255 {
        details.insert(
            "email".to_string(),
            "Email must be at most 255 characters".to_string(),
        );
    }
}

impl CreateUser {
    pub fn validate(&self) -> Result<(), ErrorDetails> {
        let mut details = ErrorDetails::new();
        validate_email(&self.email, &mut details);
        check_length(&mut details, "name", "Name", &self.name, 100);
        finish(details)
    }
}

impl UpdateUser {
    pub fn validate(&self) -> Result<(), ErrorDetails> {
        let mut details = ErrorDetails::new();
        if let Some(email) = &self.email {
            validate_email(email, &mut details);
        }
        if let Some(name) = &self.name {
            check_length(&mut details, "name", "Name", name, 100);
        }
        finish(details)
    }
}

impl User {
    fn from_model(model: user::Model) -> Self {
        Self {
            id: model.uuid,
            email: model.email,
            name: model.name,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = user::Entity::find()
            .order_by_asc(user::Column::CreatedAt)
            .order_by_asc(user::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = user::Entity::find()
            .filter(user::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    async fn email_taken<C: ConnectionTrait>(
        db: &C,
        email: &str,
        except: Option<Uuid>,
    ) -> Result<bool, DbErr> {
        let mut query = user::Entity::find().filter(user::Column::Email.eq(email));
        if let Some(id) = except {
            query = query.filter(user::Column::Uuid.ne(id));
        }
        Ok(query.one(db).await?.is_some())
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateUser,
        user_id: Uuid,
    ) -> Result<Self, UserError> {
        let email = data.email.trim().to_lowercase();
        if Self::email_taken(db, &email, None).await? {
            return Err(UserError::DuplicateEmail);
        }

        let now = Utc::now();
        let active = user::ActiveModel {
            uuid: Set(user_id),
            email: Set(email),
            name: Set(data.name.trim().to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        data: &UpdateUser,
    ) -> Result<Self, UserError> {
        let record = user::Entity::find()
            .filter(user::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(UserError::UserNotFound)?;

        let mut active: user::ActiveModel = record.into();
        if let Some(email) = &data.email {
            let email = email.trim().to_lowercase();
            if Self::email_taken(db, &email, Some(id)).await? {
                return Err(UserError::DuplicateEmail);
            }
            active.email = Set(email);
        }
        if let Some(name) = &data.name {
            active.name = Set(name.trim().to_string());
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    /// Profiles, and through them tasks and categories, go with the user.
    pub async fn delete<C>(db: &C, id: Uuid) -> Result<u64, DbErr>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let tx = db.begin().await?;
        let Some(user_row_id) = ids::user_id_by_uuid(&tx, id).await? else {
            return Ok(0);
        };
        let profile_row_ids: Vec<i64> = profile::Entity::find()
            .select_only()
            .column(profile::Column::Id)
            .filter(profile::Column::UserId.eq(user_row_id))
            .into_tuple()
            .all(&tx)
            .await?;
        Profile::purge(&tx, profile_row_ids).await?;

        let result = user::Entity::delete_many()
            .filter(user::Column::Id.eq(user_row_id))
            .exec(&tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn new_user(email: &str) -> CreateUser {
        CreateUser {
            email: email.to_string(),
            name: "Ada".to_string(),
        }
    }

    #[test]
    fn validation_reports_each_field() {
        let details = CreateUser {
            email: "not-an-email".to_string(),
            name: "  ".to_string(),
        }
        .validate()
        .unwrap_err();
        assert_eq!(details.get("email").map(String::as_str), Some("Invalid email address"));
        assert_eq!(details.get("name").map(String::as_str), Some("Name is required"));
        assert!(new_user("ada@example.com").validate().is_ok());
    }

    #[tokio::test]
    async fn email_is_unique_and_normalized() {
        let db = setup_db().await;
        let user = User::create(&db, &new_user("Ada@Example.com"), Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(user.email, "ada@example.com");

        let err = User::create(&db, &new_user("ada@example.com"), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::DuplicateEmail));
    }

    #[tokio::test]
    async fn update_and_delete() {
        let db = setup_db().await;
        let user = User::create(&db, &new_user("ada@example.com"), Uuid::new_v4())
            .await
            .unwrap();

        let updated = User::update(
            &db,
            user.id,
            &UpdateUser {
                email: None,
                name: Some("Ada Lovelace".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "Ada Lovelace");
        assert_eq!(updated.email, "ada@example.com");

        assert_eq!(User::delete(&db, user.id).await.unwrap(), 1);
        assert!(User::find_by_id(&db, user.id).await.unwrap().is_none());
        assert!(matches!(
            User::update(&db, user.id, &UpdateUser::default()).await,
            Err(UserError::UserNotFound)
        ));
    }
}
