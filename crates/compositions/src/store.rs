// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `CompositionStore` ties the loader, index, and resolver together into
//! the single handle the daemon's `composition:*` handlers hold.

use crate::index::{CompositionIndex, IndexError};
use crate::loader::{Loader, LoaderError};
use crate::resolve::{self, ResolveError};
use ksi_core::{Composition, CompositionIndexRow, CompositionType};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

pub struct CompositionStore {
    loader: Loader,
    index: CompositionIndex,
    root: PathBuf,
}

impl CompositionStore {
    pub fn open(compositions_dir: PathBuf, index_db_path: &Path) -> Result<Self, StoreError> {
        let index = CompositionIndex::open(index_db_path)?;
        Ok(Self { loader: Loader::new(compositions_dir.clone()), index, root: compositions_dir })
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn index(&self) -> &CompositionIndex {
        &self.index
    }

    pub fn rebuild_index(&self, now: f64) -> Result<usize, StoreError> {
        self.index.rebuild(&self.root, now).map_err(StoreError::from)
    }

    pub fn get(&self, name: &str, type_: CompositionType) -> Result<Composition, StoreError> {
        self.loader.load(name, type_).map_err(StoreError::from)
    }

    pub fn list(&self, type_: Option<CompositionType>) -> Result<Vec<CompositionIndexRow>, StoreError> {
        self.index.list(type_).map_err(StoreError::from)
    }

    pub fn resolve(
        &self,
        name: &str,
        type_: CompositionType,
        vars: &Map<String, Value>,
    ) -> Result<Value, StoreError> {
        resolve::resolve(&self.loader, name, type_, vars).map_err(StoreError::from)
    }

    /// Read-only dry run: resolves without touching the index or the
    /// filesystem beyond reads, reporting whether it would succeed.
    pub fn validate(&self, name: &str, type_: CompositionType, vars: &Map<String, Value>) -> Result<(), StoreError> {
        self.resolve(name, type_, vars).map(|_| ())
    }

    /// `composition:create`: persists via the loader and indexes
    /// immediately so it is visible to subsequent `composition:get`.
    pub fn create(&self, composition: &Composition, now: f64) -> Result<PathBuf, StoreError> {
        let path = self.loader.save(composition)?;
        self.index.index_file(&path, now)?;
        Ok(path)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
