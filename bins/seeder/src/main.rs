//! Database seeder for Labelvault development and testing.
//!
//! Seeds a demo project with one classification task where three annotators
//! disagree, and one extraction task where two annotators agree. A reviewer
//! can then resolve the classification key through the gold-star endpoint.
//!
//! Usage: cargo run --bin seeder

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

use labelvault_core::consensus::{TaskType, TokenTag};
use labelvault_db::entities::{
    labeling_task_labels, labeling_tasks, projects, records,
    sea_orm_active_enums::TaskType as DbTaskType,
};
use labelvault_db::repositories::{
    AnnotationRepository, SubmitClassificationInput, SubmitExtractionInput,
};
use labelvault_db::rls::RlsConnection;
use labelvault_shared::config::ConsensusConfig;
use labelvault_shared::types::{LabelId, ProjectId, RecordId, TaskId, UserId};
use labelvault_shared::{JwtConfig, JwtService, ProjectRole};

/// Demo project ID (consistent for all seeds)
const DEMO_PROJECT_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0001);
/// Demo record ID
const DEMO_RECORD_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0010);
/// Sentiment (classification) task ID
const SENTIMENT_TASK_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0020);
/// Entities (extraction) task ID
const ENTITIES_TASK_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0021);
const POS_LABEL_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0030);
const NEG_LABEL_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0031);
const PERSON_LABEL_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0032);

/// Annotators A1, A2, A3 and the reviewer.
const ANNOTATOR_IDS: [Uuid; 3] = [
    Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0101),
    Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0102),
    Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0103),
];
const REVIEWER_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0201);

struct Task {
    id: Uuid,
    name: &'static str,
    task_type: DbTaskType,
    labels: &'static [(Uuid, &'static str)],
}

const TASKS: [Task; 2] = [
    Task {
        id: SENTIMENT_TASK_ID,
        name: "sentiment",
        task_type: DbTaskType::MulticlassClassification,
        labels: &[(POS_LABEL_ID, "Pos"), (NEG_LABEL_ID, "Neg")],
    },
    Task {
        id: ENTITIES_TASK_ID,
        name: "entities",
        task_type: DbTaskType::InformationExtraction,
        labels: &[(PERSON_LABEL_ID, "Person")],
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .or_else(|_| std::env::var("LABELVAULT__DATABASE__URL"))?;

    println!("Connecting to database...");
    let db = labelvault_db::connect(&database_url).await?;

    println!("Seeding demo project...");
    seed_project(&db).await?;

    println!("Seeding labeling tasks...");
    seed_tasks(&db).await?;

    println!("Seeding manual annotations...");
    seed_annotations(&db).await?;

    if let Ok(secret) = std::env::var("LABELVAULT__JWT__SECRET") {
        print_dev_tokens(secret)?;
    }

    println!("Seeding complete!");
    Ok(())
}

fn project_id() -> ProjectId {
    ProjectId::from_uuid(DEMO_PROJECT_ID)
}

/// Seeds the demo project and its single record.
async fn seed_project(db: &DatabaseConnection) -> anyhow::Result<()> {
    if projects::Entity::find_by_id(DEMO_PROJECT_ID)
        .one(db)
        .await?
        .is_some()
    {
        println!("  Demo project already exists, skipping...");
        return Ok(());
    }

    projects::ActiveModel {
        id: Set(DEMO_PROJECT_ID),
        name: Set("Demo Project".to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;

    let rls = RlsConnection::new(db, project_id()).await?;
    records::ActiveModel {
        id: Set(DEMO_RECORD_ID),
        project_id: Set(DEMO_PROJECT_ID),
        data: Set(serde_json::json!({
            "text": "Jane Doe loved the service but hated the delivery"
        })),
        created_at: Set(Utc::now().into()),
    }
    .insert(rls.transaction())
    .await?;
    rls.commit().await?;

    println!("  Created demo project with one record");
    Ok(())
}

/// Seeds the classification and extraction tasks with their labels.
async fn seed_tasks(db: &DatabaseConnection) -> anyhow::Result<()> {
    let rls = RlsConnection::new(db, project_id()).await?;

    for task in &TASKS {
        if labeling_tasks::Entity::find_by_id(task.id)
            .one(rls.transaction())
            .await?
            .is_some()
        {
            println!("  Task {} already exists, skipping...", task.name);
            continue;
        }

        labeling_tasks::ActiveModel {
            id: Set(task.id),
            project_id: Set(DEMO_PROJECT_ID),
            name: Set(task.name.to_string()),
            task_type: Set(task.task_type),
            attribute_name: Set(Some("text".to_string())),
            created_at: Set(Utc::now().into()),
        }
        .insert(rls.transaction())
        .await?;

        for (label_id, name) in task.labels {
            labeling_task_labels::ActiveModel {
                id: Set(*label_id),
                project_id: Set(DEMO_PROJECT_ID),
                labeling_task_id: Set(task.id),
                name: Set((*name).to_string()),
                created_at: Set(Utc::now().into()),
            }
            .insert(rls.transaction())
            .await?;
        }

        println!("  Created task {} with {} labels", task.name, task.labels.len());
    }

    rls.commit().await?;
    Ok(())
}

/// A1 and A2 pick Pos, A3 picks Neg; A1 and A2 both tag "Jane Doe" as Person.
async fn seed_annotations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let annotations = AnnotationRepository::new(db.clone(), ConsensusConfig::default());
    let record_id = RecordId::from_uuid(DEMO_RECORD_ID);

    let choices = [POS_LABEL_ID, POS_LABEL_ID, NEG_LABEL_ID];
    for (annotator, label) in ANNOTATOR_IDS.iter().zip(choices) {
        let submission = annotations
            .submit_classification(SubmitClassificationInput {
                project_id: project_id(),
                record_id,
                label_id: LabelId::from_uuid(label),
                annotator_id: UserId::from_uuid(*annotator),
            })
            .await?;
        if !submission.created {
            println!("  Classification by {annotator} already exists, skipping...");
        }
    }

    let existing = annotations
        .valid_manual_annotations(
            project_id(),
            TaskId::from_uuid(ENTITIES_TASK_ID),
            Some(record_id),
        )
        .await?;
    if existing.is_empty() {
        for annotator in &ANNOTATOR_IDS[..2] {
            annotations
                .submit_extraction(SubmitExtractionInput {
                    project_id: project_id(),
                    record_id,
                    label_id: LabelId::from_uuid(PERSON_LABEL_ID),
                    annotator_id: UserId::from_uuid(*annotator),
                    tokens: vec![TokenTag::new(0, true), TokenTag::new(1, false)],
                })
                .await?;
        }
    } else {
        println!("  Extraction spans already exist, skipping...");
    }

    for (task_id, task_type) in [
        (SENTIMENT_TASK_ID, TaskType::Classification),
        (ENTITIES_TASK_ID, TaskType::Extraction),
    ] {
        let valid = annotations
            .valid_manual_annotations(project_id(), TaskId::from_uuid(task_id), None)
            .await?;
        println!("  {task_type:?} task: {} valid manual annotations", valid.len());
    }

    Ok(())
}

/// Prints tokens for the seeded users, signed with the configured secret.
fn print_dev_tokens(secret: String) -> anyhow::Result<()> {
    let jwt = JwtService::new(JwtConfig {
        secret,
        access_token_expires_minutes: 24 * 60,
    });

    println!("Development tokens (valid 24h):");
    for (i, annotator) in ANNOTATOR_IDS.iter().enumerate() {
        let token = jwt.generate_access_token(*annotator, DEMO_PROJECT_ID, ProjectRole::Annotator)?;
        println!("  A{}: {token}", i + 1);
    }
    let token = jwt.generate_access_token(REVIEWER_ID, DEMO_PROJECT_ID, ProjectRole::Reviewer)?;
    println!("  Reviewer: {token}");

    Ok(())
}
