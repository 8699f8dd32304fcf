use std::sync::Arc;

use async_trait::async_trait;
use dashnote_core::DashboardModel;

/// Sibling services initialized alongside the annotation coordinator.
///
/// Every step defaults to a no-op so hosts only override what they run.
#[async_trait]
pub trait DashboardServices: Send + Sync {
    fn init_time(&self, _dashboard: &Arc<DashboardModel>) {}

    async fn init_variables(&self, _dashboard: &Arc<DashboardModel>) -> anyhow::Result<()> {
        Ok(())
    }

    fn process_repeats(&self, _dashboard: &Arc<DashboardModel>) -> anyhow::Result<()> {
        Ok(())
    }

    fn update_submenu_visibility(&self, _dashboard: &Arc<DashboardModel>) -> anyhow::Result<()> {
        Ok(())
    }

    fn auto_fit_panels(
        &self,
        _dashboard: &Arc<DashboardModel>,
        _kiosk: Option<&str>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn track_unsaved_changes(&self, _dashboard: &Arc<DashboardModel>) -> anyhow::Result<()> {
        Ok(())
    }

    fn setup_keybindings(&self, _dashboard: &Arc<DashboardModel>) -> anyhow::Result<()> {
        Ok(())
    }

    fn set_current(&self, _dashboard: &Arc<DashboardModel>) {}
}

/// Services for headless hosts such as the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopServices;

impl DashboardServices for NoopServices {}
