//! Stakeholder service: search orchestration and write pass-through.
//!
//! Search composes the three query-side components: the filter is validated
//! first, the version store resolves matching current versions, and the
//! distance ranker annotates/sorts/filters when an origin was supplied.
//!
//! A persistence failure during search degrades to an empty result set
//! (availability over distinguishing "no results" from "error"; the failure
//! is logged with operation context). Write and transition failures always
//! propagate; callers must not assume partial success.

use tracing::error;

use crate::database::search_filter::SearchFilter;
use crate::database::stakeholder_repository::StakeholderRepositoryTrait;
use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{ScheduleEntry, Stakeholder, StakeholderInput};
use crate::ranking;

pub struct StakeholderService<R: StakeholderRepositoryTrait> {
    repository: R,
}

impl<R: StakeholderRepositoryTrait> StakeholderService<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Search current versions. Returns records ordered by name, or by
    /// ascending distance when the filter carries an origin.
    pub async fn search(&self, filter: &SearchFilter) -> DirectoryResult<Vec<Stakeholder>> {
        filter.validate()?;

        let mut results = match self.repository.all_current(filter).await {
            Ok(results) => results,
            Err(DirectoryError::Database(e)) => {
                error!(operation = "search", error = %e, "search failed, returning empty result set");
                return Ok(Vec::new());
            }
            Err(other) => return Err(other),
        };

        if let Some(origin) = filter.origin {
            ranking::rank_by_distance(
                &mut results,
                origin.latitude,
                origin.longitude,
                origin.radius_miles,
            );
        }
        Ok(results)
    }

    /// Create a new logical record (version 1 plus children).
    pub async fn create(
        &self,
        input: &StakeholderInput,
        hours: &[ScheduleEntry],
        category_ids: &[i32],
    ) -> DirectoryResult<i64> {
        self.repository.create(input, hours, category_ids).await
    }

    /// Append a new version of an existing record, replacing its
    /// schedule/category associations wholesale.
    pub async fn update(
        &self,
        id: i64,
        input: &StakeholderInput,
        hours: &[ScheduleEntry],
        category_ids: &[i32],
    ) -> DirectoryResult<i32> {
        self.repository
            .create_version(id, input, hours, category_ids)
            .await
    }

    /// Fetch the current version of one record. `distance` is `None`
    /// since no origin is involved.
    pub async fn get(&self, id: i64) -> DirectoryResult<Stakeholder> {
        self.repository.current_version(id).await
    }

    /// Hard-delete the record and all its versions.
    pub async fn remove(&self, id: i64) -> DirectoryResult<()> {
        self.repository.remove(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::search_filter::SearchOrigin;
    use async_trait::async_trait;

    fn init_test_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    struct StubRepository {
        results: Vec<Stakeholder>,
        fail: bool,
    }

    #[async_trait]
    impl StakeholderRepositoryTrait for StubRepository {
        async fn create(
            &self,
            _input: &StakeholderInput,
            _hours: &[ScheduleEntry],
            _category_ids: &[i32],
        ) -> DirectoryResult<i64> {
            Ok(1)
        }

        async fn create_version(
            &self,
            _id: i64,
            _input: &StakeholderInput,
            _hours: &[ScheduleEntry],
            _category_ids: &[i32],
        ) -> DirectoryResult<i32> {
            Ok(2)
        }

        async fn current_version(&self, id: i64) -> DirectoryResult<Stakeholder> {
            Err(DirectoryError::NotFound { id })
        }

        async fn all_current(&self, _filter: &SearchFilter) -> DirectoryResult<Vec<Stakeholder>> {
            if self.fail {
                Err(DirectoryError::Database(sqlx::Error::PoolClosed))
            } else {
                Ok(self.results.clone())
            }
        }

        async fn remove(&self, _id: i64) -> DirectoryResult<()> {
            Ok(())
        }
    }

    fn record(name: &str, latitude: Option<f64>, longitude: Option<f64>) -> Stakeholder {
        Stakeholder {
            name: name.to_string(),
            latitude,
            longitude,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_search_degrades_to_empty_on_persistence_failure() {
        init_test_tracing();
        let service = StakeholderService::new(StubRepository {
            results: vec![],
            fail: true,
        });
        let results = service.search(&SearchFilter::default()).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_without_origin_leaves_distance_unset() {
        let service = StakeholderService::new(StubRepository {
            results: vec![record("a", Some(34.1), Some(-118.3))],
            fail: false,
        });
        let results = service.search(&SearchFilter::default()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].distance, None);
    }

    #[tokio::test]
    async fn test_search_with_origin_ranks_and_filters() {
        let service = StakeholderService::new(StubRepository {
            results: vec![
                record("far", Some(44.0), Some(-118.2437)),
                record("near", Some(34.06), Some(-118.2437)),
                record("unlocated", None, None),
            ],
            fail: false,
        });
        let filter = SearchFilter {
            origin: Some(SearchOrigin {
                latitude: 34.0522,
                longitude: -118.2437,
                radius_miles: 50.0,
            }),
            ..Default::default()
        };
        let results = service.search(&filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "near");
        assert!(results[0].distance.unwrap() < 50.0);
    }

    #[tokio::test]
    async fn test_search_rejects_invalid_origin_before_querying() {
        let service = StakeholderService::new(StubRepository {
            results: vec![],
            fail: true,
        });
        let filter = SearchFilter {
            origin: Some(SearchOrigin {
                latitude: 123.0,
                longitude: 0.0,
                radius_miles: 0.0,
            }),
            ..Default::default()
        };
        let err = service.search(&filter).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_get_propagates_not_found() {
        let service = StakeholderService::new(StubRepository {
            results: vec![],
            fail: false,
        });
        let err = service.get(42).await.unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound { id: 42 }));
    }
}
