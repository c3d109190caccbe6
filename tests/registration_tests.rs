use anyhow::Result;
use chrono::{Duration, Utc};
use run_club_bot::database::{connection::DatabaseManager, models::*};
use run_club_bot::services::registration::{self, RegistrationOutcome, UnregisterOutcome};
use tempfile::{tempdir, TempDir};

async fn setup_test_db() -> Result<(DatabaseManager, TempDir)> {
    let temp_dir = tempdir()?;
    let database_url = format!("sqlite:{}", temp_dir.path().join("registration.db").display());
    let db_manager = DatabaseManager::new(&database_url).await?;
    db_manager.run_migrations().await?;
    Ok((db_manager, temp_dir))
}

async fn member(pool: &sqlx::SqlitePool, telegram_id: i64) -> Result<ClubUser> {
    let profile = TelegramProfile {
        telegram_id,
        first_name: Some(format!("Бігун {telegram_id}")),
        ..Default::default()
    };
    Ok(ClubUser::get_or_create(pool, &profile).await?.0)
}

async fn training(
    pool: &sqlx::SqlitePool,
    creator: &ClubUser,
    title: &str,
    offset: Duration,
    limits: &[(f64, i64)],
) -> Result<(TrainingEvent, Vec<TrainingDistance>)> {
    let distances: Vec<NewDistance> = limits
        .iter()
        .map(|&(distance, max_participants)| NewDistance {
            distance,
            max_participants,
            pace_min: Some("5:30".to_string()),
            pace_max: Some("6:30".to_string()),
            route_gpx: None,
        })
        .collect();
    let new = NewTraining {
        title: title.to_string(),
        description: None,
        date: Utc::now() + offset,
        location: "Труханів острів".to_string(),
        poster: None,
        created_by: creator.id,
    };
    Ok(TrainingEvent::create_with_distances(pool, new, &distances).await?)
}

#[tokio::test]
async fn test_single_distance_registers_directly() -> Result<()> {
    let (db, _dir) = setup_test_db().await?;
    let coach = member(&db.pool, 1).await?;
    member(&db.pool, 2).await?;
    let (event, distances) = training(&db.pool, &coach, "Легка п'ятірка", Duration::days(1), &[(5.0, 0)]).await?;

    let outcome = registration::register(&db.pool, event.id, 2, None).await?;
    match outcome {
        RegistrationOutcome::Registered { distance, participant, .. } => {
            assert_eq!(distance.id, distances[0].id);
            assert_eq!(participant.telegram_id, 2);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let again = registration::register(&db.pool, event.id, 2, None).await?;
    assert!(matches!(again, RegistrationOutcome::AlreadyRegistered));

    Ok(())
}

#[tokio::test]
async fn test_several_distances_require_a_choice() -> Result<()> {
    let (db, _dir) = setup_test_db().await?;
    let coach = member(&db.pool, 1).await?;
    member(&db.pool, 2).await?;
    let (event, distances) =
        training(&db.pool, &coach, "Вибір дистанції", Duration::days(1), &[(5.0, 0), (10.0, 0)]).await?;

    let outcome = registration::register(&db.pool, event.id, 2, None).await?;
    match outcome {
        RegistrationOutcome::ChooseDistance { distances: offered, .. } => assert_eq!(offered.len(), 2),
        other => panic!("unexpected outcome: {other:?}"),
    }

    let ten_km = distances.iter().find(|d| d.distance == 10.0).unwrap();
    let outcome = registration::register(&db.pool, event.id, 2, Some(ten_km.id)).await?;
    assert!(matches!(outcome, RegistrationOutcome::Registered { .. }));

    Ok(())
}

#[tokio::test]
async fn test_capacity_is_per_distance() -> Result<()> {
    let (db, _dir) = setup_test_db().await?;
    let coach = member(&db.pool, 1).await?;
    for telegram_id in 2..=4 {
        member(&db.pool, telegram_id).await?;
    }
    let (event, distances) =
        training(&db.pool, &coach, "Обмежені місця", Duration::days(1), &[(5.0, 1), (10.0, 0)]).await?;
    let (five, ten) = (distances[0].id, distances[1].id);

    assert!(matches!(
        registration::register(&db.pool, event.id, 2, Some(five)).await?,
        RegistrationOutcome::Registered { .. }
    ));
    let refused = registration::register(&db.pool, event.id, 3, Some(five)).await?;
    assert!(matches!(refused, RegistrationOutcome::Full));
    // The distance prompt stays open for another pick
    assert!(!refused.closes_distance_choice());
    // The unlimited distance still has room
    let accepted = registration::register(&db.pool, event.id, 3, Some(ten)).await?;
    assert!(matches!(accepted, RegistrationOutcome::Registered { .. }));
    assert!(accepted.closes_distance_choice());

    // Moving into a full distance is refused
    assert!(matches!(
        registration::change_distance(&db.pool, event.id, 3, five).await?,
        RegistrationOutcome::Full
    ));
    // Moving to the distance already held is a no-op
    assert!(matches!(
        registration::change_distance(&db.pool, event.id, 2, five).await?,
        RegistrationOutcome::Registered { .. }
    ));

    registration::unregister(&db.pool, event.id, 2).await?;
    match registration::change_distance(&db.pool, event.id, 3, five).await? {
        RegistrationOutcome::Registered { registration, .. } => assert_eq!(registration.distance_id, five),
        other => panic!("unexpected outcome: {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn test_refusal_order() -> Result<()> {
    let (db, _dir) = setup_test_db().await?;
    let coach = member(&db.pool, 1).await?;
    member(&db.pool, 2).await?;

    let (past, _) = training(&db.pool, &coach, "Вчорашня", -Duration::hours(1), &[(5.0, 0)]).await?;
    assert!(matches!(
        registration::register(&db.pool, past.id, 2, None).await?,
        RegistrationOutcome::AlreadyPast
    ));

    let (cancelled, _) = training(&db.pool, &coach, "Скасована", -Duration::hours(2), &[(5.0, 0)]).await?;
    TrainingEvent::cancel(&db.pool, cancelled.id, None).await?;
    // Cancellation is reported before the date check
    assert!(matches!(
        registration::register(&db.pool, cancelled.id, 2, None).await?,
        RegistrationOutcome::Cancelled
    ));

    let (empty, _) = training(&db.pool, &coach, "Без дистанцій", Duration::days(1), &[]).await?;
    assert!(matches!(
        registration::register(&db.pool, empty.id, 2, None).await?,
        RegistrationOutcome::NoDistances
    ));

    assert!(matches!(
        registration::register(&db.pool, 9999, 2, None).await?,
        RegistrationOutcome::NotFound
    ));
    assert!(matches!(
        registration::register(&db.pool, empty.id, 777, None).await?,
        RegistrationOutcome::NotFound
    ));

    Ok(())
}

#[tokio::test]
async fn test_distance_of_another_training_is_rejected() -> Result<()> {
    let (db, _dir) = setup_test_db().await?;
    let coach = member(&db.pool, 1).await?;
    member(&db.pool, 2).await?;
    let (first, _) = training(&db.pool, &coach, "Перша", Duration::days(1), &[(5.0, 0)]).await?;
    let (_, other_distances) = training(&db.pool, &coach, "Друга", Duration::days(2), &[(7.0, 0)]).await?;

    let outcome = registration::register(&db.pool, first.id, 2, Some(other_distances[0].id)).await?;
    assert!(matches!(outcome, RegistrationOutcome::NotFound));

    Ok(())
}

#[tokio::test]
async fn test_register_at_uses_given_clock() -> Result<()> {
    let (db, _dir) = setup_test_db().await?;
    let coach = member(&db.pool, 1).await?;
    member(&db.pool, 2).await?;
    let (event, _) = training(&db.pool, &coach, "Завтрашня", Duration::days(1), &[(5.0, 0)]).await?;

    let after_start = event.date + Duration::minutes(1);
    assert!(matches!(
        registration::register_at(&db.pool, event.id, 2, None, after_start).await?,
        RegistrationOutcome::AlreadyPast
    ));

    Ok(())
}

#[tokio::test]
async fn test_unregister() -> Result<()> {
    let (db, _dir) = setup_test_db().await?;
    let coach = member(&db.pool, 1).await?;
    member(&db.pool, 2).await?;
    let (event, _) = training(&db.pool, &coach, "Відписка", Duration::days(1), &[(5.0, 0)]).await?;

    assert!(matches!(
        registration::unregister(&db.pool, event.id, 2).await?,
        UnregisterOutcome::NotRegistered
    ));

    registration::register(&db.pool, event.id, 2, None).await?;
    match registration::unregister(&db.pool, event.id, 2).await? {
        UnregisterOutcome::Unregistered { training, participant } => {
            assert_eq!(training.id, event.id);
            assert_eq!(participant.telegram_id, 2);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(matches!(
        registration::unregister(&db.pool, event.id, 404).await?,
        UnregisterOutcome::NotFound
    ));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registrations_respect_capacity() -> Result<()> {
    let (db, _dir) = setup_test_db().await?;
    let coach = member(&db.pool, 1).await?;
    for telegram_id in 100..108 {
        member(&db.pool, telegram_id).await?;
    }
    let (event, distances) = training(&db.pool, &coach, "Один слот", Duration::days(1), &[(5.0, 1), (10.0, 0)]).await?;
    let (training_id, five, ten) = (event.id, distances[0].id, distances[1].id);

    let mut tasks = tokio::task::JoinSet::new();
    for telegram_id in 100..108 {
        let pool = db.pool.clone();
        tasks.spawn(async move { registration::register(&pool, training_id, telegram_id, Some(five)).await });
    }

    let mut registered = 0;
    let mut full = 0;
    while let Some(result) = tasks.join_next().await {
        match result?? {
            RegistrationOutcome::Registered { .. } => registered += 1,
            RegistrationOutcome::Full => full += 1,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert_eq!((registered, full), (1, 7));
    assert_eq!(distances[0].registrations_count(&db.pool).await?, 1);

    // Everyone else parks on the unlimited distance, then races for the single place again
    for telegram_id in 100..108 {
        registration::register(&db.pool, training_id, telegram_id, Some(ten)).await?;
    }
    let mut tasks = tokio::task::JoinSet::new();
    for telegram_id in 100..108 {
        let pool = db.pool.clone();
        tasks.spawn(async move { registration::change_distance(&pool, training_id, telegram_id, five).await });
    }
    while let Some(result) = tasks.join_next().await {
        result??;
    }
    assert_eq!(distances[0].registrations_count(&db.pool).await?, 1);

    Ok(())
}
