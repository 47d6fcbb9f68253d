//! # Example: pipeline
//!
//! Word statistics over a small corpus with fan-out/fan-in stages.
//!
//! ## Flow
//! ```text
//! source(lines) ──► split into words ──┬─► branch 0: normalize ─┐
//!                                      ├─► branch 1: normalize ─┼─► merge ──► count
//!                                      └─► branch 2: normalize ─┘
//! ```
//! Every stage closes its own output once its input is exhausted, so the final
//! `collect` returns exactly when the last word went through.
//!
//! The second half races three "mirrors" for the stop-word list and keeps the
//! first one that answers.
//!
//! ## Run
//! ```bash
//! cargo run --example pipeline
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use flowvisor::pipeline::{Stage, race, source};
use flowvisor::{RaceError, TaskError};

const CORPUS: &[&str] = &[
    "Don't communicate by sharing memory",
    "share memory by communicating",
    "Channels orchestrate; mutexes serialize",
    "The bigger the interface, the weaker the abstraction",
    "Clear is better than clever",
];

async fn fetch_stop_words(
    mirror: &'static str,
    delay_ms: u64,
) -> Result<Vec<&'static str>, TaskError> {
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    if mirror == "eu-1" {
        return Err(TaskError::fail("connection refused"));
    }
    Ok(vec!["the", "by", "is", "than"])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let stop_words = match race(
        [
            fetch_stop_words("eu-1", 5),
            fetch_stop_words("us-1", 40),
            fetch_stop_words("ap-1", 20),
        ],
        Duration::from_secs(1),
    )
    .await
    {
        Ok(words) => words,
        Err(RaceError::Timeout) => anyhow::bail!("no mirror answered in time"),
        Err(e) => anyhow::bail!("stop-word lookup failed: {e}"),
    };
    println!("stop words: {stop_words:?}");

    let words = source(CORPUS.iter().copied(), 2).then(8, |line: &str| {
        let words: Vec<String> = line.split_whitespace().map(str::to_owned).collect();
        Some(words)
    });

    // Flatten happens in a dedicated stage so the branches see single words.
    let (tx, rx) = flowvisor::channel::bounded::<String>(8);
    let flatten = tokio::spawn(async move {
        while let Some(batch) = words.output.recv().await {
            for w in batch {
                if tx.send(w).await.is_err() {
                    return;
                }
            }
        }
        tx.close();
        words.wait().await;
    });

    let branches = flowvisor::pipeline::fan_out(rx, 3, 4, move |w: String| {
        let w: String = w
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '\'')
            .flat_map(char::to_lowercase)
            .collect();
        (!w.is_empty() && !stop_words.iter().any(|s| *s == w)).then_some(w)
    });
    let merged = Stage::merge(branches, 4);

    let mut counts = BTreeMap::new();
    for w in merged.collect().await {
        *counts.entry(w).or_insert(0u32) += 1;
    }
    flatten.await?;

    for (word, n) in &counts {
        println!("{n:>3}  {word}");
    }
    Ok(())
}
