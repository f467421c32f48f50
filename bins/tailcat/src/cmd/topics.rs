use std::io::Write;

use source_kafka::KafkaSource;

use super::config::Config;
use super::error::TailcatError;

pub async fn run(config: &Config) -> Result<(), TailcatError> {
    let source = KafkaSource::connect(&config.kafka())?;
    let topics = source.topics().await?;
    tracing::debug!(broker = %config.broker, count = topics.len(), "listed topics");

    let mut out = std::io::stdout().lock();
    write_listing(&mut out, &topics)?;
    out.flush()?;
    Ok(())
}

fn write_listing(out: &mut impl Write, topics: &[String]) -> std::io::Result<()> {
    if topics.is_empty() {
        return writeln!(out, "No topics found");
    }
    writeln!(out, "Found {} topics:", topics.len())?;
    for topic in topics {
        writeln!(out, "{topic}")?;
    }
    Ok(())
}
