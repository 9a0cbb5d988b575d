//! Name based dispatch of stored procedures.

use super::application::{ProcedureBody, StoredProcedure};
use super::domain::SpResultSet;
use super::error::{Error, Result};
use super::params::ParamHelper;
use crate::transaction::service::TransactionManager;
use crate::value::Value;
use async_trait::async_trait;
use std::collections::HashMap;

/// Object safe view of a [StoredProcedure] reporting through an [SpResultSet].
#[async_trait]
pub trait Procedure: Send {
    async fn prepare(&mut self, args: &[Value]) -> Result<()>;
    async fn execute(&mut self) -> SpResultSet;
}

#[async_trait]
impl<M, H, B> Procedure for StoredProcedure<M, H, B>
where
    M: TransactionManager,
    H: ParamHelper<ResultSet = SpResultSet>,
    B: ProcedureBody<M::Tx, H>,
{
    async fn prepare(&mut self, args: &[Value]) -> Result<()> {
        StoredProcedure::prepare(self, args).await
    }

    async fn execute(&mut self) -> SpResultSet {
        StoredProcedure::execute(self).await
    }
}

type Factory = Box<dyn Fn() -> Box<dyn Procedure> + Send + Sync>;

/// Keeps track of every procedure callable by name, building a brand new instance for each call.
#[derive(Default)]
pub struct ProcedureRegistry {
    factories: HashMap<String, Factory>,
}

impl ProcedureRegistry {
    pub fn register<F, P>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> P + Send + Sync + 'static,
        P: Procedure + 'static,
    {
        let name = name.into();
        let factory: Factory = Box::new(move || Box::new(factory()) as Box<dyn Procedure>);
        if self.factories.insert(name.clone(), factory).is_some() {
            warn!(procedure = name.as_str(), "replacing registered procedure");
        }

        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Returns a fresh, unprepared instance of the given procedure.
    pub fn instantiate(&self, name: &str) -> Result<Box<dyn Procedure>> {
        let Some(factory) = self.factories.get(name) else {
            return Error::NotFound(name.to_string()).into();
        };

        Ok(factory())
    }

    /// Prepares and executes a fresh instance of the given procedure with the given arguments.
    #[instrument(skip(self, args))]
    pub async fn call(&self, name: &str, args: &[Value]) -> Result<SpResultSet> {
        let mut procedure = self.instantiate(name)?;
        procedure.prepare(args).await?;
        Ok(procedure.execute().await)
    }
}
