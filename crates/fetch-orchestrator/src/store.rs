use dashboard_core::catalog::RatioCategory;
use dashboard_core::{FilterSelection, Timeframe};
use std::sync::Arc;
use tokio::sync::watch;

/// Observable holder of the current [`FilterSelection`].
///
/// Cheap to clone; all clones share one value. Writes that leave the
/// selection unchanged do not wake subscribers.
#[derive(Clone)]
pub struct FilterStore {
    tx: Arc<watch::Sender<FilterSelection>>,
}

impl Default for FilterStore {
    fn default() -> Self {
        Self::new(FilterSelection::default())
    }
}

impl FilterStore {
    pub fn new(initial: FilterSelection) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> FilterSelection {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FilterSelection> {
        self.tx.subscribe()
    }

    /// Apply an edit; subscribers are notified only if something changed.
    pub fn update(&self, edit: impl FnOnce(&mut FilterSelection)) -> bool {
        self.tx.send_if_modified(|filters| {
            let before = filters.clone();
            edit(filters);
            *filters != before
        })
    }

    pub fn set_company(&self, company: impl Into<String>) -> bool {
        let company = company.into();
        self.update(|f| f.company = company)
    }

    pub fn set_timeframe(&self, timeframe: Timeframe) -> bool {
        self.update(|f| f.timeframe = timeframe)
    }

    pub fn set_variables<I, S>(&self, variables: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.update(|f| f.set_variables(variables))
    }

    pub fn set_ratio_category(&self, category: RatioCategory) -> bool {
        self.update(|f| f.ratio_category = category)
    }

    pub fn set_ratio_timeframe(&self, timeframe: Timeframe) -> bool {
        self.update(|f| f.ratio_timeframe = timeframe)
    }

    pub fn set_analysis_period(&self, period: impl Into<String>) -> bool {
        let period = period.into();
        self.update(|f| f.analysis_period = period)
    }

    pub fn set_query(&self, query: impl Into<String>) -> bool {
        let query = query.into();
        self.update(|f| f.query = query)
    }
}
