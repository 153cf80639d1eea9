use chrono::{Datelike, Duration, NaiveDate, Utc};
use clap::Parser;
use fake::{
    faker::{
        address::en::{CityName, StreetName},
        internet::en::SafeEmail,
        lorem::en::Sentence,
        name::en::{FirstName, LastName},
        phone_number::en::CellNumber,
    },
    Fake,
};
use flock::{
    config::Settings,
    domain::{
        Actor, CreateBranchRequest, CreateClusterRequest, CreateFamilyRequest,
        CreatePersonRequest, CreateReportRequest, GatheringType, Person, PersonStatus, Role,
    },
    service::{CrudService, ServiceContext},
};
use rand::{seq::SliceRandom, Rng};
use sqlx::sqlite::SqlitePoolOptions;

#[derive(Parser, Debug)]
#[command(about = "Populate a Flock database with sample data")]
struct Args {
    /// Database URL; defaults to the configured one
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Number of people to create besides the administrator
    #[arg(long, default_value_t = 60)]
    people: usize,

    /// Number of clusters
    #[arg(long, default_value_t = 4)]
    clusters: usize,

    /// Weeks of reports per cluster, counting back from last week
    #[arg(long, default_value_t = 6)]
    weeks: i64,

    #[arg(long, default_value = "admin")]
    admin_username: String,

    #[arg(long, default_value = "admin12345")]
    admin_password: String,
}

fn random_date(rng: &mut impl Rng, from_year: i32, to_year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
        rng.gen_range(from_year..=to_year),
        rng.gen_range(1..=12),
        rng.gen_range(1..=28),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let settings = Settings::new().unwrap_or_default();

    println!("🌱 Starting database seeding...");

    let database_url = args
        .database_url
        .clone()
        .unwrap_or_else(|| settings.database.url.clone());
    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    let context = ServiceContext::new(db_pool, &settings);
    let seed = Actor::system("seed");
    let mut rng = rand::thread_rng();

    // Administrator
    let admin = if context.account_service.needs_setup().await? {
        let mut request = CreatePersonRequest::new("Church", "Administrator");
        request.username = Some(args.admin_username.clone());
        request.password = Some(args.admin_password.clone());
        let admin = context.account_service.setup_admin(request).await?;
        println!("  ✅ Created admin user ({} / {})", admin.username, args.admin_password);
        Some(admin)
    } else {
        println!("  ⏭️  Administrator already exists, skipping");
        None
    };

    // Branches
    println!("⛪ Creating branches...");
    let mut branches = Vec::new();
    for (i, code) in ["MAIN", "NORTH", "SOUTH"].iter().enumerate() {
        let city: String = CityName().fake();
        let branch = context
            .branch_service
            .create(
                &seed,
                CreateBranchRequest {
                    code: code.to_string(),
                    name: format!("{} Branch", city),
                    address: Some(format!("{} {}", rng.gen_range(1..400), StreetName().fake::<String>())),
                    is_active: true,
                    is_headquarters: i == 0,
                },
            )
            .await?;
        branches.push(branch);
    }
    println!("  ✅ Created {} branches", branches.len());

    // People
    println!("👥 Creating people...");
    let statuses = [
        PersonStatus::Active,
        PersonStatus::Active,
        PersonStatus::Active,
        PersonStatus::Semiactive,
        PersonStatus::Invited,
        PersonStatus::Attended,
        PersonStatus::Inactive,
    ];
    let mut people: Vec<Person> = Vec::new();
    for n in 0..args.people {
        let mut request = CreatePersonRequest::new(
            FirstName().fake::<String>(),
            LastName().fake::<String>(),
        );
        request.member_id = Some(format!("M-{:05}", n + 1));
        request.email = Some(SafeEmail().fake());
        request.phone = Some(CellNumber().fake());
        request.role = match n {
            0 => Role::Pastor,
            n if n <= args.clusters => Role::Coordinator,
            n if n % 9 == 0 => Role::Visitor,
            _ => Role::Member,
        };
        request.status = statuses.choose(&mut rng).copied().unwrap_or(PersonStatus::Active);
        request.branch_id = branches.choose(&mut rng).map(|b| b.id);
        request.date_of_birth = random_date(&mut rng, 1950, 2010);
        request.date_first_attended = random_date(&mut rng, 2010, 2024);
        if request.role.is_staff() {
            request.password = Some("password123".to_string());
        }

        match context.person_service.create(&seed, request).await {
            Ok(person) => people.push(person),
            // Fake emails occasionally collide
            Err(e) => println!("  ⚠️  Skipped a person: {}", e),
        }
    }
    println!("  ✅ Created {} people (staff password: password123)", people.len());

    // Families
    println!("🏠 Creating families...");
    let mut families = Vec::new();
    for chunk in people.chunks(4).take(args.people / 6) {
        let Some(head) = chunk.first() else { continue };
        let family = context
            .family_service
            .create(
                &seed,
                CreateFamilyRequest {
                    name: format!("{} Family", head.last_name),
                    address: Some(format!("{} {}", rng.gen_range(1..400), StreetName().fake::<String>())),
                    head_id: Some(head.id),
                    members: chunk.iter().map(|p| p.id).collect(),
                    notes: None,
                },
            )
            .await?;
        families.push(family);
    }
    println!("  ✅ Created {} families", families.len());

    // Clusters
    println!("🧭 Creating clusters...");
    let coordinators: Vec<&Person> = people.iter().filter(|p| p.role == Role::Coordinator).collect();
    let schedules = ["Wednesday 7:00 PM", "Friday 7:30 PM", "Saturday 4:00 PM", "Sunday 2:00 PM"];
    let mut clusters = Vec::new();
    for i in 0..args.clusters {
        let mut members: Vec<_> = people
            .iter()
            .skip(i)
            .step_by(args.clusters.max(1))
            .map(|p| p.id)
            .collect();
        let coordinator = coordinators.get(i).map(|p| p.id);
        if let Some(id) = coordinator {
            if !members.contains(&id) {
                members.push(id);
            }
        }
        let cluster = context
            .cluster_service
            .create(
                &seed,
                CreateClusterRequest {
                    code: format!("CL-{:02}", i + 1),
                    name: format!("{} Cluster", CityName().fake::<String>()),
                    description: Some(Sentence(3..8).fake()),
                    location: Some(CityName().fake()),
                    meeting_schedule: schedules.get(i % schedules.len()).map(|s| s.to_string()),
                    coordinator_id: coordinator,
                    branch_id: branches.get(i % branches.len().max(1)).map(|b| b.id),
                    members,
                    families: families.iter().skip(i).step_by(args.clusters.max(1)).map(|f| f.id).collect(),
                },
            )
            .await?;
        clusters.push(cluster);
    }
    println!("  ✅ Created {} clusters", clusters.len());

    // Reports
    println!("📝 Creating weekly reports...");
    let visitors: Vec<_> = people.iter().filter(|p| p.role == Role::Visitor).map(|p| p.id).collect();
    let today = Utc::now().date_naive();
    let this_monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    let mut report_count = 0;
    for cluster in &clusters {
        for weeks_back in 1..=args.weeks {
            let meeting_date = this_monday - Duration::weeks(weeks_back) + Duration::days(rng.gen_range(0..7));
            let attended: Vec<_> = cluster
                .members
                .iter()
                .copied()
                .filter(|_| rng.gen_bool(0.7))
                .collect();
            let guest_count = rng.gen_range(0..3);
            let guests: Vec<_> = visitors
                .choose_multiple(&mut rng, guest_count)
                .copied()
                .collect();
            let gathering_type = [GatheringType::Physical, GatheringType::Online, GatheringType::Hybrid]
                .choose(&mut rng)
                .copied()
                .unwrap_or(GatheringType::Physical);

            context
                .report_service
                .create(
                    &seed,
                    CreateReportRequest {
                        cluster_id: cluster.id,
                        year: None,
                        week_number: None,
                        meeting_date: Some(meeting_date),
                        gathering_type,
                        members_attended: attended,
                        visitors_attended: guests,
                        activities: Some(Sentence(4..10).fake()),
                        prayer_requests: Some(Sentence(4..10).fake()),
                        testimonies: None,
                        highlights: Some(Sentence(3..8).fake()),
                        lowlights: None,
                        offering_cents: rng.gen_range(0..500_000),
                    },
                )
                .await?;
            report_count += 1;
        }
    }
    println!("  ✅ Created {} reports", report_count);

    println!("\n🎉 Database seeding completed successfully!");
    if let Some(admin) = admin {
        println!("\n📝 Sign in with {} / {}", admin.username, args.admin_password);
    }

    Ok(())
}
