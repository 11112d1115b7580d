//! Demo binary: runs one submission end to end through the pipeline and
//! prints the resulting feed.

use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use tracing::info;

use tilawa_core::{RecitationStatus, UserId};
use tilawa_feed::service::FeedParams;
use tilawa_recitation::model::NewRecitation;
use tilawa_infra::{Pipeline, PipelineConfig};

fn main() -> anyhow::Result<()> {
    tilawa_observability::init();

    let pipeline = Pipeline::start(PipelineConfig::default());
    let submissions = pipeline.submissions();

    let reciter = UserId::new();
    let draft = submissions.create_draft(NewRecitation {
        user_id: reciter,
        title: "Surah Ya-Sin".into(),
        description: Some("Evening recitation".into()),
        surah: "36".into(),
        verses: "1-12".into(),
        language: None,
    })?;
    info!(recitation_id = %draft.id, "draft created");

    submissions.upload_audio(draft.id, reciter, b"fake mp3 bytes")?;
    info!(recitation_id = %draft.id, "audio uploaded, pipeline running");

    // Wait for the two worker pools to carry the record to a decision.
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let current = submissions.recitation(draft.id)?;
        match current.status {
            RecitationStatus::Approved => break,
            RecitationStatus::Rejected => bail!("recitation was rejected"),
            _ if Instant::now() > deadline => {
                bail!("pipeline did not settle in time (status: {})", current.status)
            }
            _ => std::thread::sleep(Duration::from_millis(20)),
        }
    }

    let published = submissions.publish(draft.id, reciter)?;
    info!(recitation_id = %published.id, "recitation published");

    let page = pipeline.feed().feed(FeedParams::default())?;
    println!(
        "{}",
        serde_json::to_string_pretty(&page).context("feed page should serialize")?
    );

    pipeline.shutdown();
    Ok(())
}
