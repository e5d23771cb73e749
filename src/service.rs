// 🔁 Render Pass
// fetch → normalize → classify → aggregate, once per interaction.
// Only the connection survives between passes.

use crate::config::Config;
use crate::dashboard::{compute, DashboardSettings, DashboardView};
use crate::error::{ConfigError, SourceError};
use crate::period::YearMonth;
use crate::source::{Connector, LazyConnection};
use chrono::{Local, NaiveDate};
use tracing::{info, warn};

pub struct DashboardService {
    connection: LazyConnection,
    settings: DashboardSettings,
}

impl DashboardService {
    pub fn new(connector: Box<dyn Connector>, settings: DashboardSettings) -> Self {
        DashboardService {
            connection: LazyConnection::new(connector),
            settings,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(config.connector()?, config.settings()?))
    }

    pub fn settings(&self) -> &DashboardSettings {
        &self.settings
    }

    /// Column that drives period assignment, for user-facing warnings.
    pub fn date_column(&self) -> &str {
        &self.settings.columns.date
    }

    /// One full pass against today's date.
    pub fn render(&self, requested: Option<YearMonth>) -> Result<DashboardView, SourceError> {
        self.render_on(requested, Local::now().date_naive())
    }

    /// One full pass. A source failure aborts with no partial view.
    pub fn render_on(
        &self,
        requested: Option<YearMonth>,
        today: NaiveDate,
    ) -> Result<DashboardView, SourceError> {
        let snapshot = self.connection.fetch()?;
        let view = compute(&snapshot, &self.settings, requested, today);

        info!(
            rows = view.total_rows,
            skipped_blank = view.skipped_blank,
            months = view.available_months.len(),
            selected = view.selected_month.as_ref().map(|m| m.label.as_str()).unwrap_or("-"),
            "Render pass complete"
        );
        if view.rejected_count > 0 {
            warn!(
                rejected = view.rejected_count,
                column = %self.settings.columns.date,
                "Rows with missing or broken dates hidden"
            );
        }

        Ok(view)
    }
}
