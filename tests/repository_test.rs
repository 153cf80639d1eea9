mod common;

use chrono::{Duration, NaiveDate, Utc};
use flock::{
    auth,
    domain::{
        CreateBranchRequest, CreateClusterRequest, CreateFamilyRequest, CreatePersonRequest,
        CreateReportRequest, GatheringType, PersonStatus, ReportWeek, Role, UpdateBranchRequest, UpdateClusterRequest,
        UpdatePersonRequest,
    },
    error::AppError,
    repository::{
        BranchRepository, ClusterRepository, FamilyRepository, LockedAccountRepository,
        PersonRepository, ReportRepository, SqliteBranchRepository, SqliteClusterRepository,
        SqliteFamilyRepository, SqliteLockedAccountRepository, SqlitePersonRepository,
        SqliteReportRepository,
    },
};

fn person(first: &str, last: &str, username: &str) -> CreatePersonRequest {
    let mut request = CreatePersonRequest::new(first, last);
    request.username = Some(username.to_string());
    request
}

fn cluster(code: &str, members: Vec<uuid::Uuid>) -> CreateClusterRequest {
    CreateClusterRequest {
        code: code.to_string(),
        name: format!("Cluster {}", code),
        description: None,
        location: Some("Quezon City".to_string()),
        meeting_schedule: Some("Friday 7:00 PM".to_string()),
        coordinator_id: None,
        branch_id: None,
        members,
        families: Vec::new(),
    }
}

#[tokio::test]
async fn test_person_crud() -> anyhow::Result<()> {
    let pool = common::test_pool().await?;
    let repo = SqlitePersonRepository::new(pool.clone());

    let mut request = person("Maria", "Santos", "maria.santos");
    request.member_id = Some("M-001".to_string());
    request.email = Some("maria@example.com".to_string());
    request.date_of_birth = NaiveDate::from_ymd_opt(1988, 4, 2);
    request.password = Some("secure_password123".to_string());

    let created = repo.create(request).await?;
    assert_eq!(created.username, "maria.santos");
    assert_eq!(created.role, Role::Member);
    assert_eq!(created.status, PersonStatus::Active);
    assert_eq!(created.full_name(), "Maria Santos");

    let found = repo.find_by_id(created.id).await?;
    assert_eq!(found.as_ref().map(|p| p.id), Some(created.id));
    assert!(repo.find_by_email("maria@example.com").await?.is_some());
    assert!(repo.find_by_member_id("M-001").await?.is_some());

    // The stored hash verifies against the original password
    let hash = repo.password_hash(created.id).await?.expect("hash stored");
    assert!(auth::AuthService::verify_password("secure_password123", &hash).await?);

    let updated = repo
        .update(
            created.id,
            UpdatePersonRequest {
                status: Some(PersonStatus::Semiactive),
                middle_name: Some(Some("Luz".to_string())),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(updated.status, PersonStatus::Semiactive);
    assert_eq!(updated.middle_name.as_deref(), Some("Luz"));
    // Untouched fields survive a partial update
    assert_eq!(updated.email.as_deref(), Some("maria@example.com"));
    assert_eq!(updated.date_of_birth, NaiveDate::from_ymd_opt(1988, 4, 2));

    let cleared = repo
        .update(
            created.id,
            UpdatePersonRequest {
                email: Some(None),
                date_of_birth: Some(None),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(cleared.email, None);
    assert_eq!(cleared.date_of_birth, None);
    assert_eq!(cleared.middle_name.as_deref(), Some("Luz"));
    assert_eq!(cleared.member_id.as_deref(), Some("M-001"));

    repo.delete(created.id).await?;
    assert!(repo.find_by_id(created.id).await?.is_none());
    assert!(matches!(repo.delete(created.id).await, Err(AppError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_duplicate_username_is_a_conflict() -> anyhow::Result<()> {
    let pool = common::test_pool().await?;
    let repo = SqlitePersonRepository::new(pool);

    repo.create(person("John", "Doe", "john.doe")).await?;
    let err = repo.create(person("Johnny", "Doe", "john.doe")).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}

#[tokio::test]
async fn test_failed_login_counter() -> anyhow::Result<()> {
    let pool = common::test_pool().await?;
    let repo = SqlitePersonRepository::new(pool);
    let p = repo.create(person("Ana", "Cruz", "ana.cruz")).await?;

    assert_eq!(repo.record_failed_login(p.id).await?, 1);
    assert_eq!(repo.record_failed_login(p.id).await?, 2);
    repo.reset_failed_logins(p.id).await?;
    assert_eq!(repo.record_failed_login(p.id).await?, 1);

    Ok(())
}

#[tokio::test]
async fn test_cluster_membership_is_replaced_wholesale() -> anyhow::Result<()> {
    let pool = common::test_pool().await?;
    let people = SqlitePersonRepository::new(pool.clone());
    let clusters = SqliteClusterRepository::new(pool.clone());

    let a = people.create(person("A", "One", "a.one")).await?;
    let b = people.create(person("B", "Two", "b.two")).await?;
    let c = people.create(person("C", "Three", "c.three")).await?;

    let created = clusters.create(cluster("CL-01", vec![a.id, b.id])).await?;
    assert_eq!(created.members, vec![a.id, b.id]);
    assert_eq!(created.member_count(), 2);
    assert!(clusters.find_by_code("CL-01").await?.is_some());

    let updated = clusters
        .update(
            created.id,
            UpdateClusterRequest {
                members: Some(vec![c.id]),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(updated.members, vec![c.id]);
    assert_eq!(updated.name, "Cluster CL-01");

    Ok(())
}

#[tokio::test]
async fn test_cluster_coordinator_can_be_unassigned() -> anyhow::Result<()> {
    let pool = common::test_pool().await?;
    let people = SqlitePersonRepository::new(pool.clone());
    let clusters = SqliteClusterRepository::new(pool.clone());

    let lead = people.create(person("Noel", "Sy", "noel.sy")).await?;
    let mut request = cluster("CL-04", vec![lead.id]);
    request.coordinator_id = Some(lead.id);
    let created = clusters.create(request).await?;
    assert_eq!(created.coordinator_id, Some(lead.id));

    let updated = clusters
        .update(
            created.id,
            UpdateClusterRequest {
                coordinator_id: Some(None),
                location: Some(None),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(updated.coordinator_id, None);
    assert_eq!(updated.location, None);
    assert_eq!(updated.meeting_schedule.as_deref(), Some("Friday 7:00 PM"));
    assert_eq!(updated.members, vec![lead.id]);

    Ok(())
}

fn report(cluster_id: uuid::Uuid, week: u32, members: Vec<uuid::Uuid>, visitors: Vec<uuid::Uuid>) -> CreateReportRequest {
    CreateReportRequest {
        cluster_id,
        year: Some(2024),
        week_number: Some(week),
        meeting_date: None,
        gathering_type: GatheringType::Physical,
        members_attended: members,
        visitors_attended: visitors,
        activities: None,
        prayer_requests: None,
        testimonies: None,
        highlights: None,
        lowlights: None,
        offering_cents: 0,
    }
}

#[tokio::test]
async fn test_deleted_person_leaves_every_roster() -> anyhow::Result<()> {
    let pool = common::test_pool().await?;
    let people = SqlitePersonRepository::new(pool.clone());
    let families = SqliteFamilyRepository::new(pool.clone());
    let clusters = SqliteClusterRepository::new(pool.clone());
    let reports = SqliteReportRepository::new(pool.clone());

    let a = people.create(person("Rosa", "Lim", "rosa.lim")).await?;
    let b = people.create(person("Tom", "Lim", "tom.lim")).await?;

    let family = families
        .create(CreateFamilyRequest {
            name: "Lim".to_string(),
            address: None,
            head_id: Some(a.id),
            members: vec![a.id, b.id],
            notes: None,
        })
        .await?;
    let mut request = cluster("CL-03", vec![a.id, b.id]);
    request.coordinator_id = Some(a.id);
    request.families = vec![family.id];
    let cl = clusters.create(request).await?;
    let week = ReportWeek::new(2024, 10)?;
    let rep = reports
        .create(report(cl.id, 10, vec![a.id, b.id], vec![a.id]), week, Some(a.id))
        .await?;

    people.delete(a.id).await?;

    let cl = clusters.find_by_id(cl.id).await?.expect("cluster survives");
    assert_eq!(cl.members, vec![b.id]);
    assert_eq!(cl.member_count(), 1);
    assert_eq!(cl.coordinator_id, None);

    let family = families.find_by_id(family.id).await?.expect("family survives");
    assert_eq!(family.members, vec![b.id]);
    assert_eq!(family.head_id, None);

    let rep = reports.find_by_id(rep.id).await?.expect("report survives");
    assert_eq!(rep.members_attended, vec![b.id]);
    assert!(rep.visitors_attended.is_empty());
    assert_eq!(rep.submitted_by, None);

    // Deleting the household takes it off the cluster too
    families.delete(family.id).await?;
    let cl = clusters.find_by_id(cl.id).await?.expect("cluster survives");
    assert!(cl.families.is_empty());
    assert_eq!(cl.members, vec![b.id]);

    Ok(())
}

#[tokio::test]
async fn test_one_report_per_cluster_week() -> anyhow::Result<()> {
    let pool = common::test_pool().await?;
    let clusters = SqliteClusterRepository::new(pool.clone());
    let reports = SqliteReportRepository::new(pool.clone());

    let cl = clusters.create(cluster("CL-02", Vec::new())).await?;
    let request = CreateReportRequest {
        cluster_id: cl.id,
        year: Some(2024),
        week_number: Some(52),
        meeting_date: None,
        gathering_type: GatheringType::Physical,
        members_attended: Vec::new(),
        visitors_attended: Vec::new(),
        activities: Some("Bible study".to_string()),
        prayer_requests: None,
        testimonies: None,
        highlights: None,
        lowlights: None,
        offering_cents: 125_000,
    };
    let week = ReportWeek::new(2024, 52)?;

    let report = reports.create(request.clone(), week, None).await?;
    assert_eq!(report.week(), week);
    assert_eq!(report.offering_cents, 125_000);
    assert!(reports.find_by_week(cl.id, week).await?.is_some());

    let err = reports.create(request, week, None).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}

#[tokio::test]
async fn test_single_headquarters() -> anyhow::Result<()> {
    let pool = common::test_pool().await?;
    let repo = SqliteBranchRepository::new(pool);

    let main = repo
        .create(CreateBranchRequest {
            code: "MAIN".to_string(),
            name: "Main".to_string(),
            address: None,
            is_active: true,
            is_headquarters: true,
        })
        .await?;
    let north = repo
        .create(CreateBranchRequest {
            code: "NORTH".to_string(),
            name: "North".to_string(),
            address: None,
            is_active: true,
            is_headquarters: false,
        })
        .await?;

    repo.update(
        north.id,
        UpdateBranchRequest {
            is_headquarters: Some(true),
            ..Default::default()
        },
    )
    .await?;

    let branches = repo.list_all().await?;
    let headquarters: Vec<_> = branches.iter().filter(|b| b.is_headquarters).collect();
    assert_eq!(headquarters.len(), 1);
    assert_eq!(headquarters[0].id, north.id);
    assert!(!repo.find_by_id(main.id).await?.expect("main exists").is_headquarters);

    Ok(())
}

#[tokio::test]
async fn test_lock_activity() -> anyhow::Result<()> {
    let pool = common::test_pool().await?;
    let people = SqlitePersonRepository::new(pool.clone());
    let locks = SqliteLockedAccountRepository::new(pool);
    let p = people.create(person("Ben", "Reyes", "ben.reyes")).await?;

    let now = Utc::now();
    let lock = locks
        .create(&p, 5, Some(now + Duration::minutes(30)), "too many attempts")
        .await?;
    assert!(locks.find_active(p.id, now).await?.is_some());
    // A timed lock lapses on its own
    assert!(locks.find_active(p.id, now + Duration::minutes(31)).await?.is_none());

    let unlocked = locks.unlock(lock.id, None).await?;
    assert!(unlocked.unlocked_at.is_some());
    assert!(locks.find_active(p.id, now).await?.is_none());
    assert!(matches!(locks.unlock(lock.id, None).await, Err(AppError::Conflict(_))));

    Ok(())
}
