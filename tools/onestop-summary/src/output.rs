use anyhow::{Context, Result};
use onestop::graph::EntityGraph;
use onestop::models::EntityRef;
use onestop::serialize::{to_json, Profile};
use serde_json::Value;
use std::path::{Path, PathBuf};

const STATUS_FILE: &str = "status.txt";

/// Write a JSON document, pretty-printed.
pub fn write_json(value: &Value, output_path: &Path) -> Result<()> {
    let json_string = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;

    std::fs::write(output_path, json_string)
        .with_context(|| format!("Failed to write JSON to {}", output_path.display()))?;

    Ok(())
}

/// Write the feed summary and one document per operator into `output_dir`.
///
/// Files are named after the entity's Onestop id. Operator documents are
/// `.geojson` under the interchange profile and `.json` otherwise.
pub fn write_feed_documents(
    graph: &EntityGraph,
    feed: EntityRef,
    profile: Profile,
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let feed_id = graph.onestop(feed)?;
    let feed_path = output_dir.join(format!("{feed_id}.json"));
    write_json(&to_json(graph, feed, profile)?, &feed_path)?;
    log::info!("  Wrote feed {} to {}", feed_id, feed_path.display());
    written.push(feed_path);

    let extension = match profile {
        Profile::Interchange => "geojson",
        Profile::Storage { .. } => "json",
    };
    for operator in graph.operators(feed) {
        let operator_id = graph.onestop(operator)?;
        let path = output_dir.join(format!("{operator_id}.{extension}"));
        write_json(&to_json(graph, operator, profile)?, &path)?;
        log::info!(
            "  Wrote operator {} ({} routes, {} stops) to {}",
            operator_id,
            graph.routes(operator).len(),
            graph.stops(operator).len(),
            path.display()
        );
        written.push(path);
    }

    Ok(written)
}

/// Whether a previous run already finished in `output_dir`.
pub fn is_done(output_dir: &Path) -> bool {
    output_dir.join(STATUS_FILE).exists()
}

pub fn mark_done(output_dir: &Path) -> Result<()> {
    let path = output_dir.join(STATUS_FILE);
    std::fs::write(&path, "done")
        .with_context(|| format!("Failed to write status to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;
    use onestop::models::{Entity, EntityKind, FeedMeta};

    fn small_feed() -> (EntityGraph, EntityRef) {
        let mut graph = EntityGraph::new();
        let feed = graph.insert(Entity::feed("test", FeedMeta::default()));
        let operator = graph.insert(Entity::new(EntityKind::Operator, "Demo Transit Authority"));
        let route = graph.insert(Entity::new(EntityKind::Route, "AB"));
        let stop = graph.insert(
            Entity::new(EntityKind::Stop, "Bullfrog (Demo)")
                .with_geometry(Some(Point::new(-116.81797, 36.88108).into())),
        );
        graph.link(route, stop);
        graph.link(operator, route);
        graph.link(feed, operator);
        (graph, feed)
    }

    #[test]
    fn test_write_feed_documents() {
        let dir = tempfile::tempdir().unwrap();
        let (graph, feed) = small_feed();

        let written =
            write_feed_documents(&graph, feed, Profile::Interchange, dir.path()).unwrap();
        let names: Vec<_> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "f-9qscv9zzb5-test.json",
                "o-9qscv9zzb5-demotransitauthority.geojson"
            ]
        );

        let operator: Value =
            serde_json::from_str(&std::fs::read_to_string(&written[1]).unwrap()).unwrap();
        assert_eq!(operator["type"], "FeatureCollection");
        assert_eq!(operator["features"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_storage_profile_uses_json_extension() {
        let dir = tempfile::tempdir().unwrap();
        let (graph, feed) = small_feed();

        let written = write_feed_documents(
            &graph,
            feed,
            Profile::Storage { relations: false },
            dir.path(),
        )
        .unwrap();
        assert!(written.iter().all(|p| p.extension().unwrap() == "json"));
    }

    #[test]
    fn test_status_marker() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_done(dir.path()));
        mark_done(dir.path()).unwrap();
        assert!(is_done(dir.path()));
    }
}
