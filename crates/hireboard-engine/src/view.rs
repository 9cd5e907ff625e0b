//! View resolution: which projection of the pipeline drives the UI.
//!
//! [`ViewMode`] is a tagged variant, so Focused and Filtered can never be
//! active together. Projections are derived on every read and borrow from
//! their source; nothing here is cached.

use std::collections::HashMap;

use hireboard_types::{Application, ApplicationId, SearchCriteria, StageMetrics, Status};

// ---------------------------------------------------------------------------
// ViewMode
// ---------------------------------------------------------------------------

/// The flattened result of the last accepted query.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredView {
    pub criteria: SearchCriteria,
    pub applications: Vec<Application>,
    /// Set when the query failed; `applications` is then empty.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ViewMode {
    /// All five columns grouped from the entity store.
    #[default]
    Canonical,
    /// A single column drilled into, still read from the entity store.
    Focused(Status),
    /// The query channel's flattened result overrides grouping.
    Filtered(FilteredView),
}

impl ViewMode {
    pub fn is_canonical(&self) -> bool {
        matches!(self, ViewMode::Canonical)
    }

    pub fn is_focused(&self) -> bool {
        matches!(self, ViewMode::Focused(_))
    }

    pub fn is_filtered(&self) -> bool {
        matches!(self, ViewMode::Filtered(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ViewMode::Canonical => "canonical",
            ViewMode::Focused(_) => "focused",
            ViewMode::Filtered(_) => "filtered",
        }
    }
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Column<'a> {
    pub stage: Status,
    pub applications: Vec<&'a Application>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FocusedColumn<'a> {
    pub column: Column<'a>,
    /// Passed through from the analytics source when it has data for this stage.
    pub metrics: Option<StageMetrics>,
}

/// What the UI renders. Exactly one variant at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection<'a> {
    Canonical(Vec<Column<'a>>),
    Focused(FocusedColumn<'a>),
    Filtered {
        criteria: &'a SearchCriteria,
        applications: &'a [Application],
        error: Option<&'a str>,
    },
}

/// Group applications into the five columns in one pass, keeping source
/// order inside each column. Withdrawn records fall out.
pub fn group(applications: &[Application]) -> Vec<Column<'_>> {
    let mut buckets: [Vec<&Application>; 5] = Default::default();
    for app in applications {
        if let Some(idx) = app.status.column_index() {
            buckets[idx].push(app);
        }
    }
    Status::COLUMNS
        .iter()
        .zip(buckets)
        .map(|(stage, applications)| Column {
            stage: *stage,
            applications,
        })
        .collect()
}

pub fn focus(
    applications: &[Application],
    stage: Status,
    metrics: Option<StageMetrics>,
) -> FocusedColumn<'_> {
    FocusedColumn {
        column: Column {
            stage,
            applications: applications.iter().filter(|a| a.status == stage).collect(),
        },
        metrics,
    }
}

fn ids_of(applications: &[&Application]) -> Vec<ApplicationId> {
    applications.iter().map(|a| a.id.clone()).collect()
}

fn status_in(applications: &[Application], id: &ApplicationId) -> Option<Status> {
    applications.iter().find(|a| &a.id == id).map(|a| a.status)
}

// ---------------------------------------------------------------------------
// ViewResolver
// ---------------------------------------------------------------------------

/// Holds the active [`ViewMode`] and the pass-through stage metrics.
#[derive(Debug, Clone, Default)]
pub struct ViewResolver {
    mode: ViewMode,
    metrics: HashMap<Status, StageMetrics>,
}

impl ViewResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> &ViewMode {
        &self.mode
    }

    pub(crate) fn mode_mut(&mut self) -> &mut ViewMode {
        &mut self.mode
    }

    /// Replace the mode, returning the previous one.
    pub fn set_mode(&mut self, mode: ViewMode) -> ViewMode {
        tracing::debug!(from = self.mode.name(), to = mode.name(), "View mode switched");
        std::mem::replace(&mut self.mode, mode)
    }

    pub fn set_metrics(&mut self, metrics: HashMap<Status, StageMetrics>) {
        self.metrics = metrics;
    }

    pub fn metrics(&self, stage: Status) -> Option<StageMetrics> {
        self.metrics.get(&stage).copied()
    }

    pub fn projection<'a>(&'a self, store: &'a [Application]) -> Projection<'a> {
        match &self.mode {
            ViewMode::Canonical => Projection::Canonical(group(store)),
            ViewMode::Focused(stage) => {
                Projection::Focused(focus(store, *stage, self.metrics(*stage)))
            }
            ViewMode::Filtered(view) => Projection::Filtered {
                criteria: &view.criteria,
                applications: &view.applications,
                error: view.error.as_deref(),
            },
        }
    }

    /// The lists range selection walks: one per column in Canonical mode,
    /// a single list otherwise.
    pub fn navigable(&self, store: &[Application]) -> Vec<Vec<ApplicationId>> {
        match self.projection(store) {
            Projection::Canonical(columns) => columns.iter().map(|c| ids_of(&c.applications)).collect(),
            Projection::Focused(focused) => vec![ids_of(&focused.column.applications)],
            Projection::Filtered { applications, .. } => {
                vec![applications.iter().map(|a| a.id.clone()).collect()]
            }
        }
    }

    /// The navigable lists flattened into one sequence.
    pub fn visible_ids(&self, store: &[Application]) -> Vec<ApplicationId> {
        self.navigable(store).into_iter().flatten().collect()
    }

    /// Status of an application as the active view sees it.
    pub fn visible_status(&self, store: &[Application], id: &ApplicationId) -> Option<Status> {
        match &self.mode {
            ViewMode::Filtered(view) => {
                status_in(&view.applications, id).or_else(|| status_in(store, id))
            }
            ViewMode::Canonical | ViewMode::Focused(_) => status_in(store, id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn apps() -> Vec<Application> {
        vec![
            Application::new("a", Status::Applied),
            Application::new("b", Status::Interview),
            Application::new("c", Status::Applied),
            Application::new("w", Status::Withdrawn),
            Application::new("d", Status::Rejected),
            Application::new("e", Status::Offer),
        ]
    }

    fn names(column: &Column<'_>) -> Vec<String> {
        column.applications.iter().map(|a| a.id.to_string()).collect()
    }

    #[test]
    fn grouping_is_complete_and_disjoint() {
        let apps = apps();
        let columns = group(&apps);
        assert_eq!(columns.len(), 5);

        let mut seen = HashSet::new();
        let mut total = 0;
        for column in &columns {
            for app in &column.applications {
                assert_eq!(app.status, column.stage);
                assert!(seen.insert(app.id.clone()), "duplicate {}", app.id);
                total += 1;
            }
        }
        let expected = apps.iter().filter(|a| a.status != Status::Withdrawn).count();
        assert_eq!(total, expected);
        assert!(!seen.contains(&ApplicationId::new("w")));
    }

    #[test]
    fn grouping_keeps_source_order() {
        let apps = apps();
        let columns = group(&apps);
        assert_eq!(columns[0].stage, Status::Applied);
        assert_eq!(names(&columns[0]), vec!["a", "c"]);
        assert!(columns[1].applications.is_empty());
    }

    #[test]
    fn canonical_navigable_has_one_list_per_column() {
        let apps = apps();
        let resolver = ViewResolver::new();
        let nav = resolver.navigable(&apps);
        assert_eq!(nav.len(), 5);
        let flat: Vec<_> = resolver
            .visible_ids(&apps)
            .into_iter()
            .map(|i| i.to_string())
            .collect();
        assert_eq!(flat, vec!["a", "c", "b", "e", "d"]);
    }

    #[test]
    fn focused_projection_passes_metrics_through() {
        let apps = apps();
        let mut resolver = ViewResolver::new();
        resolver.set_metrics(HashMap::from([(
            Status::Applied,
            StageMetrics {
                avg_days_in_stage: 4.0,
            },
        )]));
        resolver.set_mode(ViewMode::Focused(Status::Applied));

        match resolver.projection(&apps) {
            Projection::Focused(focused) => {
                assert_eq!(names(&focused.column), vec!["a", "c"]);
                assert_eq!(focused.metrics.map(|m| m.avg_days_in_stage), Some(4.0));
            }
            other => panic!("expected focused projection, got {other:?}"),
        }
        assert_eq!(resolver.navigable(&apps).len(), 1);
    }

    #[test]
    fn focused_without_metrics_is_none() {
        let apps = apps();
        let mut resolver = ViewResolver::new();
        resolver.set_mode(ViewMode::Focused(Status::Offer));
        match resolver.projection(&apps) {
            Projection::Focused(focused) => assert!(focused.metrics.is_none()),
            other => panic!("expected focused projection, got {other:?}"),
        }
    }

    #[test]
    fn filtered_projection_ignores_store() {
        let apps = apps();
        let mut resolver = ViewResolver::new();
        resolver.set_mode(ViewMode::Filtered(FilteredView {
            criteria: SearchCriteria {
                text: Some("x".into()),
                ..Default::default()
            },
            applications: vec![Application::new("x", Status::Offer)],
            error: None,
        }));
        assert_eq!(resolver.visible_ids(&apps), vec![ApplicationId::new("x")]);
        assert_eq!(
            resolver.visible_status(&apps, &ApplicationId::new("x")),
            Some(Status::Offer)
        );
        assert!(matches!(resolver.projection(&apps), Projection::Filtered { .. }));
    }

    #[test]
    fn set_mode_returns_previous() {
        let mut resolver = ViewResolver::new();
        let previous = resolver.set_mode(ViewMode::Focused(Status::Interview));
        assert!(previous.is_canonical());
        assert!(resolver.mode().is_focused());
        assert!(!resolver.mode().is_filtered());
    }
}
