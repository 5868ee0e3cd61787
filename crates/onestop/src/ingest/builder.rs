use std::fmt;

use hashbrown::{HashMap, HashSet};
use tracing::{debug, info, warn};

use super::records::{FeedRecord, OperatorRecord, RouteRecord, StopRecord};
use crate::graph::{EntityGraph, STOP_GEOHASH_LENGTH};
use crate::identifiers::*;
use crate::mangle::mangle;
use crate::models::{Entity, EntityKind, EntityRef, FeedMeta, OnestopError, Result};
use crate::spatial::geohash;

/// Feed-level settings not carried by the records themselves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestOptions {
    pub feed_format: String,
    /// Retrieval location, used when the record has none.
    pub url: Option<String>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            feed_format: crate::models::DEFAULT_FEED_FORMAT.to_string(),
            url: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// No usable geometry: no point for a stop, no resolvable stop for a
    /// route, no accepted route for an operator.
    NoPoints,
    /// A route referenced a stop id the feed does not define (or that was
    /// itself skipped).
    UnresolvedStop,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPoints => f.write_str("no points"),
            Self::UnresolvedStop => f.write_str("unresolved stop"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedRecord {
    pub kind: EntityKind,
    pub source: SourceIdentifier,
    pub reason: SkipReason,
}

/// What an ingestion run created, merged and left out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub stops_created: usize,
    pub stops_merged: usize,
    pub routes_created: usize,
    pub routes_disambiguated: usize,
    pub operators_created: usize,
    pub skipped: Vec<SkippedRecord>,
}

impl IngestReport {
    fn skip(&mut self, kind: EntityKind, source: SourceIdentifier, reason: SkipReason) {
        warn!(%kind, %source, %reason, "skipping record");
        self.skipped.push(SkippedRecord {
            kind,
            source,
            reason,
        });
    }
}


#[derive(Debug)]
pub struct Ingested {
    /// `None` when none of the feed's operators could be located; the
    /// report lists every record that was left out.
    pub feed: Option<EntityRef>,
    pub report: IngestReport,
}

/// Build a feed and everything below it from raw records.
///
/// Stops are grouped by their computed identifier: the first record creates
/// the stop, later records with the same identifier only add provenance.
/// Routes are then created per operator, linking the stops they reference;
/// a route whose identifier collides with an earlier route of the same
/// operator is renamed with a `~N` tail (N from 2) until its identifier is
/// unique. Operators without any accepted route are skipped, and a feed
/// without any accepted operator is skipped too.
///
/// Stops enter the graph when the first route serves them, and the feed
/// once an operator is accepted, so skipped records never leave unlinked
/// entities behind.
///
/// A native stop id given twice, or the same source identifier recorded
/// twice on one entity, is an error.
pub fn ingest_feed(
    graph: &mut EntityGraph,
    record: &FeedRecord,
    options: &IngestOptions,
) -> Result<Ingested> {
    let mut report = IngestReport::default();
    let mut stops = StopTable::build(&record.name, &record.stops, &mut report)?;

    let mut operators = Vec::new();
    for operator in &record.operators {
        if let Some(op) = ingest_operator(graph, &record.name, operator, &mut stops, &mut report)? {
            operators.push(op);
        }
    }
    report.stops_created = stops.inserted;

    if operators.is_empty() {
        report.skip(
            EntityKind::Feed,
            SourceIdentifier::new(&record.name),
            SkipReason::NoPoints,
        );
        return Ok(Ingested { feed: None, report });
    }

    let meta = FeedMeta {
        url: record.url.clone().or_else(|| options.url.clone()),
        content_hash: record.content_hash.clone(),
        feed_format: options.feed_format.clone(),
    };
    let feed = graph.insert(Entity::feed(&record.name, meta).with_tags(record.tags.clone()));
    for operator in operators {
        graph.link(feed, operator);
    }

    let id = graph.onestop(feed)?;
    info!(
        feed = %id,
        stops = report.stops_created,
        merged = report.stops_merged,
        routes = report.routes_created,
        disambiguated = report.routes_disambiguated,
        operators = report.operators_created,
        skipped = report.skipped.len(),
        "ingested feed"
    );
    Ok(Ingested {
        feed: Some(feed),
        report,
    })
}

/// Stops grouped by computed identifier, added to the graph on first use.
struct StopTable {
    slots: Vec<StopSlot>,
    by_native: HashMap<String, usize>,
    inserted: usize,
}

struct StopSlot {
    pending: Option<Entity>,
    handle: Option<EntityRef>,
}

impl StopTable {
    fn build(feed_name: &str, records: &[StopRecord], report: &mut IngestReport) -> Result<Self> {
        let mut table = Self {
            slots: Vec::new(),
            by_native: HashMap::new(),
            inserted: 0,
        };
        let mut by_onestop: HashMap<OnestopId, usize> = HashMap::new();

        for record in records {
            let source = SourceIdentifier::scoped(feed_name, &record.id);
            if table.by_native.contains_key(&record.id) {
                return Err(OnestopError::ExistingIdentifier(source));
            }

            let entity = Entity::new(EntityKind::Stop, &record.name)
                .with_geometry(record.geometry.clone())
                .with_tags(record.tags.clone());
            let point = match entity.located_point() {
                Ok(point) => point,
                Err(OnestopError::NoPoints(_)) => {
                    report.skip(EntityKind::Stop, source, SkipReason::NoPoints);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let id = OnestopId::assemble(
                EntityKind::Stop,
                &geohash::encode(point, STOP_GEOHASH_LENGTH),
                &mangle(&record.name, EntityKind::Stop),
            );

            let slot = match by_onestop.get(&id).copied() {
                Some(slot) => {
                    debug!(%id, %source, "merging stop");
                    report.stops_merged += 1;
                    slot
                }
                None => {
                    table.slots.push(StopSlot {
                        pending: Some(entity.with_onestop(id.clone())),
                        handle: None,
                    });
                    by_onestop.insert(id, table.slots.len() - 1);
                    table.slots.len() - 1
                }
            };
            // every slot is still pending while the table is being built
            if let Some(stop) = table.slots[slot].pending.as_mut() {
                stop.add_identifier(source, record.tags.clone())?;
            }
            table.by_native.insert(record.id.clone(), slot);
        }

        Ok(table)
    }

    /// The stop behind a native id, added to the graph if not there yet.
    fn resolve(&mut self, graph: &mut EntityGraph, native: &str) -> Option<EntityRef> {
        let slot = &mut self.slots[*self.by_native.get(native)?];
        if let Some(entity) = slot.pending.take() {
            slot.handle = Some(graph.insert(entity));
            self.inserted += 1;
        }
        slot.handle
    }
}

fn ingest_operator(
    graph: &mut EntityGraph,
    feed_name: &str,
    record: &OperatorRecord,
    stops: &mut StopTable,
    report: &mut IngestReport,
) -> Result<Option<EntityRef>> {
    let mut taken: HashSet<OnestopId> = HashSet::new();
    let mut routes = Vec::new();
    for route in &record.routes {
        if let Some(r) = ingest_route(graph, feed_name, route, stops, &mut taken, report)? {
            routes.push(r);
        }
    }

    let source = SourceIdentifier::scoped(feed_name, &record.id);
    if routes.is_empty() {
        report.skip(EntityKind::Operator, source, SkipReason::NoPoints);
        return Ok(None);
    }

    let operator =
        graph.insert(Entity::new(EntityKind::Operator, &record.name).with_tags(record.tags.clone()));
    for route in routes {
        graph.link(operator, route);
    }
    graph.add_identifier(operator, source, record.tags.clone())?;
    report.operators_created += 1;
    debug!(operator = %graph.onestop(operator)?, "created operator");
    Ok(Some(operator))
}

fn ingest_route(
    graph: &mut EntityGraph,
    feed_name: &str,
    record: &RouteRecord,
    stops: &mut StopTable,
    taken: &mut HashSet<OnestopId>,
    report: &mut IngestReport,
) -> Result<Option<EntityRef>> {
    let source = SourceIdentifier::scoped(feed_name, &record.id);

    let mut served = Vec::new();
    for native in &record.stops {
        match stops.resolve(graph, native) {
            Some(stop) => served.push(stop),
            None => report.skip(
                EntityKind::Stop,
                SourceIdentifier::scoped(feed_name, native),
                SkipReason::UnresolvedStop,
            ),
        }
    }
    if served.is_empty() {
        report.skip(EntityKind::Route, source, SkipReason::NoPoints);
        return Ok(None);
    }

    let route = graph.insert(
        Entity::new(EntityKind::Route, &record.name)
            .with_geometry(record.geometry.clone())
            .with_tags(record.tags.clone()),
    );
    for stop in served {
        graph.link(route, stop);
    }

    let mut id = graph.onestop(route)?;
    if taken.contains(&id) {
        let first = id.clone();
        let mut n = 2;
        while taken.contains(&id) {
            graph.set_name(route, format!("{}{SEPARATOR}{n}", record.name));
            id = graph.onestop(route)?;
            n += 1;
        }
        warn!(collided = %first, assigned = %id, %source, "route id collision");
        report.routes_disambiguated += 1;
    }
    taken.insert(id);

    graph.add_identifier(route, source, record.tags.clone())?;
    report.routes_created += 1;
    Ok(Some(route))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::records::*;
    use crate::models::{Shape, Tags};
    use geo::Point;

    fn stop(id: &str, name: &str, lon: f64, lat: f64) -> StopRecord {
        StopRecord {
            id: id.into(),
            name: name.into(),
            geometry: Some(Shape::Point(Point::new(lon, lat))),
            tags: Tags::new(),
        }
    }

    fn route(id: &str, name: &str, stops: &[&str]) -> RouteRecord {
        RouteRecord {
            id: id.into(),
            name: name.into(),
            geometry: None,
            tags: Tags::new(),
            stops: stops.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn feed(stops: Vec<StopRecord>, routes: Vec<RouteRecord>) -> FeedRecord {
        FeedRecord {
            name: "test".into(),
            url: None,
            content_hash: None,
            tags: Tags::new(),
            stops,
            operators: vec![OperatorRecord {
                id: "DTA".into(),
                name: "Demo Transit Authority".into(),
                tags: Tags::new(),
                routes,
            }],
        }
    }

    fn two_stops() -> Vec<StopRecord> {
        vec![
            stop("BEATTY_AIRPORT", "Nye County Airport (Demo)", -116.784582, 36.868446),
            stop("BULLFROG", "Bullfrog (Demo)", -116.81797, 36.88108),
        ]
    }

    /// Ingest a record that is expected to produce a feed.
    fn ingest(record: &FeedRecord) -> (EntityGraph, EntityRef, IngestReport) {
        let mut graph = EntityGraph::new();
        let Ingested { feed, report } =
            ingest_feed(&mut graph, record, &IngestOptions::default()).unwrap();
        (graph, feed.unwrap(), report)
    }

    fn skipped(report: &IngestReport) -> Vec<(EntityKind, &str, SkipReason)> {
        report
            .skipped
            .iter()
            .map(|s| (s.kind, s.source.as_str(), s.reason))
            .collect()
    }

    #[test]
    fn test_stops_with_same_id_are_merged() {
        let mut stops = two_stops();
        stops.push(stop("BULLFROG_2", "Bullfrog (Demo)", -116.81797, 36.88108));
        let record = feed(
            stops,
            vec![route("AB", "AB", &["BEATTY_AIRPORT", "BULLFROG", "BULLFROG_2"])],
        );

        let (graph, feed, report) = ingest(&record);

        assert_eq!(report.stops_created, 2);
        assert_eq!(report.stops_merged, 1);
        assert_eq!(graph.stops(feed).len(), 2);

        let r = graph.routes(feed)[0];
        assert_eq!(graph.get(r).children().len(), 2);
        let bullfrog = graph.get(r).children()[1];
        let ids: Vec<_> = graph
            .get(bullfrog)
            .identifiers()
            .iter()
            .map(|p| p.identifier.as_str())
            .collect();
        assert_eq!(ids, ["test:BULLFROG", "test:BULLFROG_2"]);
    }

    #[test]
    fn test_repeated_source_id_is_an_error() {
        let mut stops = two_stops();
        stops.push(stop("BULLFROG", "Bullfrog (Demo)", -116.81797, 36.88108));
        let record = feed(stops, vec![route("AB", "AB", &["BULLFROG"])]);

        let mut graph = EntityGraph::new();
        let result = ingest_feed(&mut graph, &record, &IngestOptions::default());
        assert!(matches!(result, Err(OnestopError::ExistingIdentifier(_))));
    }

    #[test]
    fn test_repeated_native_stop_id_with_different_stops() {
        let record = feed(
            vec![
                stop("X", "First", -116.784582, 36.868446),
                stop("X", "Second", -116.81797, 36.88108),
            ],
            vec![route("AB", "AB", &["X"])],
        );

        let mut graph = EntityGraph::new();
        let err = ingest_feed(&mut graph, &record, &IngestOptions::default()).unwrap_err();

        assert!(
            matches!(&err, OnestopError::ExistingIdentifier(id) if id.as_str() == "test:X"),
            "{err:?}"
        );
        assert!(graph.is_empty());
    }

    #[test]
    fn test_route_collision_is_disambiguated() {
        let record = feed(
            two_stops(),
            vec![
                route("AB", "AB", &["BEATTY_AIRPORT", "BULLFROG"]),
                route("AB_EXPRESS", "AB", &["BULLFROG", "BEATTY_AIRPORT"]),
                route("AB_LATE", "AB", &["BEATTY_AIRPORT", "BULLFROG"]),
            ],
        );

        let (graph, feed, report) = ingest(&record);

        let ids: Vec<String> = graph
            .routes(feed)
            .into_iter()
            .map(|r| graph.onestop(r).unwrap().to_string())
            .collect();
        assert_eq!(ids, ["r-9qscy-ab", "r-9qscy-ab~2", "r-9qscy-ab~3"]);
        assert_eq!(report.routes_disambiguated, 2);

        // the first route and the stops keep their names
        assert_eq!(graph.get(graph.routes(feed)[0]).name(), "AB");
        for s in graph.stops(feed) {
            assert!(!graph.get(s).name().contains(SEPARATOR));
        }
    }

    #[test]
    fn test_route_collisions_are_scoped_per_operator() {
        let mut record = feed(two_stops(), vec![route("AB", "AB", &["BULLFROG"])]);
        record.operators.push(OperatorRecord {
            id: "OTHER".into(),
            name: "Other Transit".into(),
            tags: Tags::new(),
            routes: vec![route("AB_OTHER", "AB", &["BULLFROG"])],
        });

        let (graph, feed, report) = ingest(&record);

        assert_eq!(report.operators_created, 2);
        assert_eq!(report.routes_disambiguated, 0);
        for op in graph.operators(feed) {
            let r = graph.routes(op)[0];
            assert_eq!(graph.get(r).name(), "AB");
        }
    }

    #[test]
    fn test_skipped_records_are_reported() {
        let mut stops = two_stops();
        stops.push(StopRecord {
            id: "NOWHERE".into(),
            name: "Nowhere".into(),
            geometry: None,
            tags: Tags::new(),
        });
        let mut record = feed(
            stops,
            vec![
                route("AB", "AB", &["BEATTY_AIRPORT", "MISSING"]),
                route("GHOST", "Ghost", &["NOWHERE"]),
            ],
        );
        record.operators.push(OperatorRecord {
            id: "EMPTY".into(),
            name: "Empty".into(),
            tags: Tags::new(),
            routes: vec![],
        });

        let (graph, feed, report) = ingest(&record);

        assert_eq!(
            skipped(&report),
            [
                (EntityKind::Stop, "test:NOWHERE", SkipReason::NoPoints),
                (EntityKind::Stop, "test:MISSING", SkipReason::UnresolvedStop),
                (EntityKind::Stop, "test:NOWHERE", SkipReason::UnresolvedStop),
                (EntityKind::Route, "test:GHOST", SkipReason::NoPoints),
                (EntityKind::Operator, "test:EMPTY", SkipReason::NoPoints),
            ]
        );
        assert_eq!(graph.operators(feed).len(), 1);
        assert_eq!(graph.routes(feed).len(), 1);
        assert_eq!(graph.stops(feed).len(), 1);

        // the unserved BULLFROG stop never enters the graph
        assert_eq!(report.stops_created, 1);
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_unlocatable_feed_keeps_report() {
        let record = feed(two_stops(), vec![route("AB", "AB", &["MISSING"])]);

        let mut graph = EntityGraph::new();
        let Ingested { feed, report } =
            ingest_feed(&mut graph, &record, &IngestOptions::default()).unwrap();

        assert_eq!(feed, None);
        assert_eq!(
            skipped(&report),
            [
                (EntityKind::Stop, "test:MISSING", SkipReason::UnresolvedStop),
                (EntityKind::Route, "test:AB", SkipReason::NoPoints),
                (EntityKind::Operator, "test:DTA", SkipReason::NoPoints),
                (EntityKind::Feed, "test", SkipReason::NoPoints),
            ]
        );
        assert_eq!(report.stops_created, 0);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_feed_without_operators_is_skipped() {
        let mut record = feed(two_stops(), vec![]);
        record.operators.clear();

        let mut graph = EntityGraph::new();
        let Ingested { feed, report } =
            ingest_feed(&mut graph, &record, &IngestOptions::default()).unwrap();

        assert_eq!(feed, None);
        assert_eq!(
            skipped(&report),
            [(EntityKind::Feed, "test", SkipReason::NoPoints)]
        );
        assert!(graph.is_empty());
    }

    #[test]
    fn test_options_fill_feed_meta() {
        let record = feed(two_stops(), vec![route("AB", "AB", &["BULLFROG"])]);
        let options = IngestOptions {
            feed_format: "gtfs".into(),
            url: Some("https://example.com/sample-feed.zip".into()),
        };

        let mut graph = EntityGraph::new();
        let Ingested { feed, .. } = ingest_feed(&mut graph, &record, &options).unwrap();
        let meta = graph.get(feed.unwrap()).feed_meta().unwrap();
        assert_eq!(meta.url.as_deref(), Some("https://example.com/sample-feed.zip"));
        assert_eq!(meta.content_hash, None);
    }
}
