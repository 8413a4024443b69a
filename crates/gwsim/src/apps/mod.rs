//! Built-in demo applications
//!
//! - [`ClockApplication`] answers time requests
//! - [`InventoryApplication`] reports the installed package list

mod clock;
mod inventory;

pub use clock::{ClockApplication, ClockReply, CLOCK_APP_ID};
pub use inventory::{InventoryApplication, InventoryReport, Package, INVENTORY_APP_ID};

use std::sync::Arc;

use gwsim_core::{Application, TopicError};

use crate::config::ApplicationsConfig;

/// Instantiate the applications enabled in `config`, in a fixed order
pub fn from_config(config: &ApplicationsConfig) -> Result<Vec<Arc<dyn Application>>, TopicError> {
    let mut applications: Vec<Arc<dyn Application>> = Vec::new();
    if config.clock {
        applications.push(Arc::new(ClockApplication::new()?));
    }
    if config.inventory.enabled {
        applications.push(Arc::new(InventoryApplication::new(
            config.inventory.packages.clone(),
        )?));
    }
    Ok(applications)
}
