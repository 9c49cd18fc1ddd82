use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "cases")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub victim_name: Option<String>,
    pub victim_age: Option<i32>,
    pub victim_gender: Option<String>,
    pub victim_marital_status: Option<String>,
    pub victim_occupation: Option<String>,
    pub victim_commune: Option<String>,

    /// Region the case belongs to; anchors admin visibility.
    pub victim_region: Option<String>,

    pub perpetrator_gender: Option<String>,
    pub perpetrator_age: Option<i32>,
    pub perpetrator_relationship: Option<String>,

    pub violence_type: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub violence_description: Option<String>,

    pub incident_date: Option<Date>,
    pub incident_location: Option<String>,

    /// JSON array of service labels, order preserved.
    #[sea_orm(column_type = "Text")]
    pub services_provided: String,

    pub status: String,

    pub agent_id: i32,
    pub agent_name: String,

    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
    pub submitted_at: Option<ChronoDateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
