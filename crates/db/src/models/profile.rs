use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionSession, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utils_core::{response::ErrorDetails, serde_helpers::deserialize_some};
use uuid::Uuid;

use super::{
    ids,
    task::{Task, TaskStats},
    validation::{check_color, check_length, finish},
};
use crate::entities::{category, profile, task};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Profile not found")]
    ProfileNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("A profile with this name already exists for this user")]
    DuplicateName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ProfileWithStats {
    #[serde(flatten)]
    #[ts(flatten)]
    pub profile: Profile,
    pub task_stats: TaskStats,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfile {
    pub user_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub name: Option<String>,
    /// `null` clears the color.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_some"
    )]
    #[ts(optional)]
    pub color: Option<Option<String>>,
}

impl CreateProfile {
    pub fn validate(&self) -> Result<(), ErrorDetails> {
        let mut details = ErrorDetails::new();
        check_length(&mut details, "name", "Profile name", &self.name, 50);
        check_color(&mut details, "color", self.color.as_deref());
        finish(details)
    }
}

impl UpdateProfile {
    pub fn validate(&self) -> Result<(), ErrorDetails> {
        let mut details = ErrorDetails::new();
        if let Some(name) = &self.name {
            check_length(&mut details, "name", "Profile name", name, 50);
        }
        check_color(&mut details, "color", self.color.as_ref().and_then(|c| c.as_deref()));
        finish(details)
    }
}

impl Profile {
    fn from_model(model: profile::Model, user_id: Uuid) -> Self {
        Self {
            id: model.uuid,
            user_id,
            name: model.name,
            color: model.color,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    async fn resolve<C: ConnectionTrait>(db: &C, model: profile::Model) -> Result<Self, DbErr> {
        let user_id = ids::user_uuid_by_id(db, model.user_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;
        Ok(Self::from_model(model, user_id))
    }

    pub async fn find_by_user_id<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
            return Ok(Vec::new());
        };
        let records = profile::Entity::find()
            .filter(profile::Column::UserId.eq(user_row_id))
            .order_by_asc(profile::Column::CreatedAt)
            .order_by_asc(profile::Column::Id)
            .all(db)
            .await?;
        Ok(records
            .into_iter()
            .map(|model| Self::from_model(model, user_id))
            .collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = profile::Entity::find()
            .filter(profile::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::resolve(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_with_stats<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<ProfileWithStats>, DbErr> {
        let Some(profile) = Self::find_by_id(db, id).await? else {
            return Ok(None);
        };
        let task_stats = Task::stats_for_profile(db, id).await?;
        Ok(Some(ProfileWithStats {
            profile,
            task_stats,
        }))
    }

    /// Case-insensitive check against the user's other profiles.
    async fn name_taken<C: ConnectionTrait>(
        db: &C,
        user_row_id: i64,
        name: &str,
        except: Option<i64>,
    ) -> Result<bool, DbErr> {
        let mut query = profile::Entity::find()
            .select_only()
            .column(profile::Column::Name)
            .filter(profile::Column::UserId.eq(user_row_id));
        if let Some(row_id) = except {
            query = query.filter(profile::Column::Id.ne(row_id));
        }
        let names: Vec<String> = query.into_tuple().all(db).await?;
        let wanted = name.to_lowercase();
        Ok(names.iter().any(|existing| existing.to_lowercase() == wanted))
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateProfile,
        profile_id: Uuid,
    ) -> Result<Self, ProfileError> {
        let user_row_id = ids::user_id_by_uuid(db, data.user_id)
            .await?
            .ok_or(ProfileError::UserNotFound)?;
        let name = data.name.trim().to_string();
        if Self::name_taken(db, user_row_id, &name, None).await? {
            return Err(ProfileError::DuplicateName);
        }

        let now = Utc::now();
        let active = profile::ActiveModel {
            uuid: Set(profile_id),
            user_id: Set(user_row_id),
            name: Set(name),
            color: Set(data.color.clone()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model, data.user_id))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        data: &UpdateProfile,
    ) -> Result<Self, ProfileError> {
        let record = profile::Entity::find()
            .filter(profile::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(ProfileError::ProfileNotFound)?;

        let row_id = record.id;
        let user_row_id = record.user_id;
        let mut active: profile::ActiveModel = record.into();
        if let Some(name) = &data.name {
            let name = name.trim().to_string();
            if Self::name_taken(db, user_row_id, &name, Some(row_id)).await? {
                return Err(ProfileError::DuplicateName);
            }
            active.name = Set(name);
        }
        if let Some(color) = &data.color {
            active.color = Set(color.clone());
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::resolve(db, updated).await?)
    }

    pub async fn delete<C>(db: &C, id: Uuid) -> Result<u64, DbErr>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let tx = db.begin().await?;
        let Some(row_id) = ids::profile_id_by_uuid(&tx, id).await? else {
            return Ok(0);
        };
        let removed = Self::purge(&tx, vec![row_id]).await?;
        tx.commit().await?;
        Ok(removed)
    }

    /// Removes profiles together with their tasks and categories.
    pub(crate) async fn purge<C: ConnectionTrait>(
        db: &C,
        profile_row_ids: Vec<i64>,
    ) -> Result<u64, DbErr> {
        if profile_row_ids.is_empty() {
            return Ok(0);
        }
        task::Entity::delete_many()
            .filter(task::Column::ProfileId.is_in(profile_row_ids.clone()))
            .exec(db)
            .await?;
        category::Entity::delete_many()
            .filter(category::Column::ProfileId.is_in(profile_row_ids.clone()))
            .exec(db)
            .await?;
        let result = profile::Entity::delete_many()
            .filter(profile::Column::Id.is_in(profile_row_ids))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::models::{
        category::{Category, CreateCategory},
        task::CreateTask,
        user::{CreateUser, User},
    };

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn seed_user(db: &sea_orm::DatabaseConnection) -> User {
        User::create(
            db,
            &CreateUser {
                email: format!("{}@example.com", Uuid::new_v4()),
                name: "Owner".to_string(),
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap()
    }

    fn named(user_id: Uuid, name: &str) -> CreateProfile {
        CreateProfile {
            user_id,
            name: name.to_string(),
            color: Some("#3B82F6".to_string()),
        }
    }

    #[test]
    fn validation_trims_and_checks_color() {
        let mut data = named(Uuid::new_v4(), "  ");
        data.color = Some("blue".to_string());
        let details = data.validate().unwrap_err();
        assert_eq!(details["name"], "Profile name is required");
        assert!(details.contains_key("color"));

        let clear = UpdateProfile {
            name: None,
            color: Some(None),
        };
        assert!(clear.validate().is_ok());
    }

    #[tokio::test]
    async fn names_are_unique_per_user_ignoring_case() {
        let db = setup_db().await;
        let owner = seed_user(&db).await;
        let other = seed_user(&db).await;

        Profile::create(&db, &named(owner.id, "Work"), Uuid::new_v4())
            .await
            .unwrap();
        let err = Profile::create(&db, &named(owner.id, " work "), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::DuplicateName));

        // Same name under a different user is fine.
        Profile::create(&db, &named(other.id, "WORK"), Uuid::new_v4())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rename_to_own_name_is_allowed() {
        let db = setup_db().await;
        let owner = seed_user(&db).await;
        let work = Profile::create(&db, &named(owner.id, "Work"), Uuid::new_v4())
            .await
            .unwrap();
        Profile::create(&db, &named(owner.id, "Home"), Uuid::new_v4())
            .await
            .unwrap();

        let renamed = Profile::update(
            &db,
            work.id,
            &UpdateProfile {
                name: Some("WORK".to_string()),
                color: Some(None),
            },
        )
        .await
        .unwrap();
        assert_eq!(renamed.name, "WORK");
        assert_eq!(renamed.color, None);

        let clash = Profile::update(
            &db,
            work.id,
            &UpdateProfile {
                name: Some("home".to_string()),
                color: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(clash, ProfileError::DuplicateName));
    }

    #[tokio::test]
    async fn unknown_user_is_rejected() {
        let db = setup_db().await;
        let err = Profile::create(&db, &named(Uuid::new_v4(), "Work"), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::UserNotFound));
    }

    #[tokio::test]
    async fn delete_removes_tasks_and_categories() {
        let db = setup_db().await;
        let owner = seed_user(&db).await;
        let profile = Profile::create(&db, &named(owner.id, "Work"), Uuid::new_v4())
            .await
            .unwrap();
        let category = Category::create(
            &db,
            &CreateCategory {
                profile_id: profile.id,
                name: "Errands".to_string(),
                color: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let task = Task::create(
            &db,
            &CreateTask::new(profile.id, "Buy milk"),
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        assert_eq!(Profile::delete(&db, profile.id).await.unwrap(), 1);
        assert!(Profile::find_by_id(&db, profile.id).await.unwrap().is_none());
        assert!(Task::find_by_id(&db, task.id).await.unwrap().is_none());
        assert!(Category::find_by_id(&db, category.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn user_delete_cascades_to_profiles() {
        let db = setup_db().await;
        let owner = seed_user(&db).await;
        let profile = Profile::create(&db, &named(owner.id, "Work"), Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(User::delete(&db, owner.id).await.unwrap(), 1);
        assert!(Profile::find_by_id(&db, profile.id).await.unwrap().is_none());
        assert!(Profile::find_by_user_id(&db, owner.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stats_view_counts_the_profiles_tasks() {
        let db = setup_db().await;
        let owner = seed_user(&db).await;
        let profile = Profile::create(&db, &named(owner.id, "Work"), Uuid::new_v4())
            .await
            .unwrap();
        Task::create(&db, &CreateTask::new(profile.id, "one"), Uuid::new_v4())
            .await
            .unwrap();

        let with_stats = Profile::find_with_stats(&db, profile.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(with_stats.profile.name, "Work");
        assert_eq!(with_stats.task_stats.pending, 1);
        assert!(
            Profile::find_with_stats(&db, Uuid::new_v4())
                .await
                .unwrap()
                .is_none()
        );
    }
}
