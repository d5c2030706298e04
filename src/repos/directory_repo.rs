//! Organization directory: member countries, projects, document library
//! and the aggregate numbers the dashboard shows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Member {
    pub id: Uuid,
    pub country: String,
    pub status: String,
    pub since: i32,
    pub tier: String,
    pub payment_status: String,
    pub representative: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
pub struct NewMember {
    pub country: String,
    pub status: String,
    pub since: i32,
    pub tier: String,
    pub payment_status: String,
    #[serde(default)]
    pub representative: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    // Stored comma-joined, exposed as an array.
    #[serde(serialize_with = "comma_list")]
    pub countries: String,
    pub status: String,
    pub budget_minor: i64,
    pub progress: i32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub image_url: String,
    pub implementing_agency: String,
}

fn comma_list<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
    let list: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();
    list.serialize(serializer)
}

#[derive(Debug, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub countries: Vec<String>,
    pub status: String,
    #[serde(default)]
    pub budget_minor: i64,
    #[serde(default)]
    pub progress: i32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub implementing_agency: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub file_type: String,
    pub file_size: String,
    pub upload_date: DateTime<Utc>,
    pub download_count: i32,
    pub file_url: String,
    pub restricted: bool,
}

#[derive(Debug, Deserialize)]
pub struct NewDocument {
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub file_size: String,
    pub file_url: String,
    #[serde(default)]
    pub restricted: bool,
}

#[derive(Debug, FromRow, Serialize)]
pub struct GrowthPoint {
    pub since: i32,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardMetrics {
    pub member_count: i64,
    pub observer_count: i64,
    pub active_projects: i64,
    pub total_documents: i64,
    pub growth_data: Vec<GrowthPoint>,
    pub recent_members: Vec<Member>,
}

pub async fn list_members(pool: &PgPool) -> Result<Vec<Member>, sqlx::Error> {
    sqlx::query_as::<_, Member>("SELECT * FROM members ORDER BY country")
        .fetch_all(pool)
        .await
}

pub async fn find_member(pool: &PgPool, id: Uuid) -> Result<Option<Member>, sqlx::Error> {
    sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create_member(pool: &PgPool, member: &NewMember) -> Result<Member, sqlx::Error> {
    sqlx::query_as::<_, Member>(
        r#"
        INSERT INTO members
            (country, status, since, tier, payment_status, representative, latitude, longitude)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(&member.country)
    .bind(&member.status)
    .bind(member.since)
    .bind(&member.tier)
    .bind(&member.payment_status)
    .bind(&member.representative)
    .bind(member.latitude)
    .bind(member.longitude)
    .fetch_one(pool)
    .await
}

pub async fn list_projects(pool: &PgPool) -> Result<Vec<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects ORDER BY start_date DESC")
        .fetch_all(pool)
        .await
}

pub async fn find_project(pool: &PgPool, id: Uuid) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create_project(pool: &PgPool, project: &NewProject) -> Result<Project, sqlx::Error> {
    sqlx::query_as::<_, Project>(
        r#"
        INSERT INTO projects
            (name, description, countries, status, budget_minor, progress,
             start_date, end_date, image_url, implementing_agency)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.countries.join(","))
    .bind(&project.status)
    .bind(project.budget_minor)
    .bind(project.progress)
    .bind(project.start_date)
    .bind(project.end_date)
    .bind(&project.image_url)
    .bind(&project.implementing_agency)
    .fetch_one(pool)
    .await
}

pub async fn list_documents(pool: &PgPool) -> Result<Vec<Document>, sqlx::Error> {
    sqlx::query_as::<_, Document>("SELECT * FROM documents ORDER BY upload_date DESC")
        .fetch_all(pool)
        .await
}

pub async fn find_document(pool: &PgPool, id: Uuid) -> Result<Option<Document>, sqlx::Error> {
    sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create_document(pool: &PgPool, doc: &NewDocument) -> Result<Document, sqlx::Error> {
    sqlx::query_as::<_, Document>(
        r#"
        INSERT INTO documents (title, category, file_type, file_size, file_url, restricted)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(&doc.title)
    .bind(&doc.category)
    .bind(&doc.file_type)
    .bind(&doc.file_size)
    .bind(&doc.file_url)
    .bind(doc.restricted)
    .fetch_one(pool)
    .await
}

/// Bump the download counter and hand back the file location. `None` means
/// no such document.
pub async fn record_download(pool: &PgPool, id: Uuid) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        UPDATE documents
        SET download_count = download_count + 1
        WHERE id = $1
        RETURNING file_url
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(url,)| url))
}

pub async fn dashboard_metrics(pool: &PgPool) -> Result<DashboardMetrics, sqlx::Error> {
    let (member_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM members WHERE status = 'Active'")
            .fetch_one(pool)
            .await?;
    let (observer_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM members WHERE status = 'Observer'")
            .fetch_one(pool)
            .await?;
    let (active_projects,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM projects WHERE status = 'Active'")
            .fetch_one(pool)
            .await?;
    let (total_documents,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents")
        .fetch_one(pool)
        .await?;
    let growth_data = sqlx::query_as::<_, GrowthPoint>(
        "SELECT since, COUNT(*) AS count FROM members GROUP BY since ORDER BY since",
    )
    .fetch_all(pool)
    .await?;
    let recent_members = sqlx::query_as::<_, Member>(
        "SELECT * FROM members ORDER BY since DESC, country LIMIT 5",
    )
    .fetch_all(pool)
    .await?;

    Ok(DashboardMetrics {
        member_count,
        observer_count,
        active_projects,
        total_documents,
        growth_data,
        recent_members,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countries_serialize_as_a_trimmed_array() {
        let project = Project {
            id: Uuid::nil(),
            name: "Regional Broadband".to_string(),
            description: String::new(),
            countries: "Fiji, Samoa,Tonga,".to_string(),
            status: "Active".to_string(),
            budget_minor: 0,
            progress: 0,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: None,
            image_url: String::new(),
            implementing_agency: String::new(),
        };
        let json = serde_json::to_value(&project).unwrap();
        assert_eq!(
            json["countries"],
            serde_json::json!(["Fiji", "Samoa", "Tonga"])
        );
    }
}
