//! Built-in row operations for rowtask.
//!
//! Each operation kind registers an [`OperationFactory`] under a short id,
//! usable from workflow files and the command line.
//!
//! # Operations
//!
//! - `concat` - join column values into one column
//! - `template` - fill a `{column}` template from the row
//! - `lookup` - map a column's value through a second CSV table
//! - `command` - run an external program per row and keep its output
//!
//! # Features
//!
//! - `lookup` (default) - the `lookup` operation
//! - `command` (default) - the `command` operation

mod columns;
#[cfg(feature = "command")]
mod command;
mod concat;
#[cfg(feature = "lookup")]
mod lookup;
mod template;

#[cfg(feature = "command")]
pub use command::CommandOperation;
pub use concat::ConcatOperation;
#[cfg(feature = "lookup")]
pub use lookup::LookupOperation;
pub use template::{Template, TemplateOperation};

use rowtask::{OperationFactory, Registry};

/// Register all enabled operations with the registry.
pub fn register_all(registry: &mut Registry) {
    for factory in factories() {
        registry.register_boxed(factory);
    }
}

/// Factories for all enabled operations, in listing order.
pub fn factories() -> Vec<Box<dyn OperationFactory>> {
    let mut out: Vec<Box<dyn OperationFactory>> = vec![
        Box::new(concat::ConcatFactory::new()),
        Box::new(template::TemplateFactory::new()),
    ];
    #[cfg(feature = "lookup")]
    out.push(Box::new(lookup::LookupFactory::new()));
    #[cfg(feature = "command")]
    out.push(Box::new(command::CommandFactory::new()));
    out
}
