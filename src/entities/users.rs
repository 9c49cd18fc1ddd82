use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    #[sea_orm(unique)]
    pub username: String,

    #[sea_orm(unique)]
    pub email: Option<String>,

    /// Argon2id password hash
    pub password_hash: String,

    /// `agent`, `admin` or `super-admin`
    pub role: String,

    pub region: Option<String>,

    pub department: Option<String>,

    pub commune: Option<String>,

    /// `active` or `inactive`
    pub status: String,

    pub failed_login_attempts: i32,

    pub lock_until: Option<ChronoDateTimeUtc>,

    pub last_failed_login: Option<ChronoDateTimeUtc>,

    pub last_login: Option<ChronoDateTimeUtc>,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
