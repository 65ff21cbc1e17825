//! Seed an in-memory store, train a model and print predictions with nudges

use chrono::{Duration, Utc};
use lifelens_engine::{Engine, EngineConfig, MemoryStore};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let engine = match Engine::new(Arc::new(MemoryStore::new()), EngineConfig::default()) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };

    if let Err(e) = run(&engine).await {
        eprintln!("Error: {e}");
    }
}

async fn run(engine: &Engine) -> Result<(), lifelens_engine::EngineError> {
    let user = engine.create_user("Demo", "challenger")?;
    let now = Utc::now();

    let plan = [
        ("Running", 2, vec![true, true, true, true]),
        ("Reading", 6, vec![true, false, true, true]),
        ("Stretching", 12, vec![false, true, true]),
        ("Piano", 80, vec![true, false, false]),
        ("Journaling", 150, vec![false, false]),
        ("Cooking", 200, vec![true, false, false, false]),
    ];

    let mut habits = Vec::new();
    for (name, hours_ago, outcomes) in plan {
        let habit = engine.add_habit(&user.id, name, 1)?;
        let n = outcomes.len() as i64;
        for (i, success) in outcomes.iter().enumerate() {
            let at = now - Duration::hours(hours_ago) - Duration::days(n - 1 - i as i64);
            engine.log_event_at(&user.id, &habit.id, *success, at)?;
        }
        habits.push(habit);
    }

    let fresh = engine.add_habit(&user.id, "Meditation", 1)?;
    habits.push(fresh);

    let trained = engine.train_at(&user.id, now)?;
    println!("trained: {trained}\n");

    for habit in &habits {
        let prediction = engine.predict_at(&user.id, &habit.id, now)?;
        let message = engine
            .nudge(&habit.name, prediction.probability, &user.style)
            .await;
        println!(
            "{:<11} p={:.2} ({:?})\n  {}",
            habit.name, prediction.probability, prediction.source, message
        );
    }
    Ok(())
}
