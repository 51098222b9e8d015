//! News service
//!
//! Business rules for news items:
//! - titles are unique
//! - the tag set of a news item is replaced by diffing the requested ids
//!   against the current links; untouched links stay as they are
//! - every create, update and delete commits as one transaction

use crate::db::is_foreign_key_violation;
use crate::db::repositories::NewsRepository;
use crate::models::{News, NewsForEdit, NewsWithRelations, TagChanges};
use anyhow::Context;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Error types for news service operations
#[derive(Debug, thiserror::Error)]
pub enum NewsServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    DuplicateTitle(String),

    /// Storage refused the delete because of a foreign key
    #[error("{0}")]
    LinkedEntity(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

const DUPLICATE_TITLE: &str = "A news item with this title already exists.";
const NOT_FOUND: &str = "News item not found.";
const LINKED: &str = "Cannot delete the news item because of existing links.";

/// Compute which tag links to add and which to remove so that the links of
/// a news item become exactly the distinct `requested` ids.
pub fn reconcile_tags(current: &[i64], requested: &[i64]) -> TagChanges {
    let current: BTreeSet<i64> = current.iter().copied().collect();
    let requested: BTreeSet<i64> = requested.iter().copied().collect();

    TagChanges {
        added: requested.difference(&current).copied().collect(),
        removed: current.difference(&requested).copied().collect(),
    }
}

/// News service
pub struct NewsService {
    repo: Arc<dyn NewsRepository>,
}

impl NewsService {
    pub fn new(repo: Arc<dyn NewsRepository>) -> Self {
        Self { repo }
    }

    /// All news, newest first, with author and tags
    pub async fn list(&self) -> Result<Vec<NewsWithRelations>, NewsServiceError> {
        Ok(self
            .repo
            .list_with_relations()
            .await
            .context("Failed to list news")?)
    }

    /// One news item with author and tags
    pub async fn get_by_id(&self, id: i64) -> Result<Option<NewsWithRelations>, NewsServiceError> {
        Ok(self
            .repo
            .get_with_relations(id)
            .await
            .with_context(|| format!("Failed to get news {}", id))?)
    }

    /// A news item and the ids of its current tags
    pub async fn get_for_edit(&self, id: i64) -> Result<Option<NewsForEdit>, NewsServiceError> {
        let Some(news) = self
            .repo
            .get_by_id(id)
            .await
            .with_context(|| format!("Failed to get news {}", id))?
        else {
            return Ok(None);
        };

        let tag_ids = self
            .repo
            .get_tag_ids(id)
            .await
            .with_context(|| format!("Failed to get tags of news {}", id))?;

        Ok(Some(NewsForEdit { news, tag_ids }))
    }

    /// Create a news item linked to the distinct `tag_ids`; returns its id.
    ///
    /// # Errors
    /// - `DuplicateTitle` if another news item has the title
    /// - `InternalError` if saving fails, including unknown tag or author ids
    pub async fn create(&self, news: News, tag_ids: &[i64]) -> Result<i64, NewsServiceError> {
        if self
            .repo
            .exists_with_title(&news.title)
            .await
            .context("Failed to check news title")?
        {
            return Err(NewsServiceError::DuplicateTitle(DUPLICATE_TITLE.to_string()));
        }

        let distinct: Vec<i64> = tag_ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let created = self
            .repo
            .create_with_tags(&news, &distinct)
            .await
            .context("Failed to create news")?;

        Ok(created.id)
    }

    /// Overwrite title, body and author, then make the tag links match
    /// `tag_ids`.
    ///
    /// # Errors
    /// - `NotFound` if the id is unknown
    /// - `DuplicateTitle` if another news item has the title
    pub async fn update(&self, news: News, tag_ids: &[i64]) -> Result<(), NewsServiceError> {
        let mut current = self
            .repo
            .get_by_id(news.id)
            .await
            .with_context(|| format!("Failed to get news {}", news.id))?
            .ok_or_else(|| NewsServiceError::NotFound(NOT_FOUND.to_string()))?;

        if self
            .repo
            .exists_other_with_title(news.id, &news.title)
            .await
            .context("Failed to check news title")?
        {
            return Err(NewsServiceError::DuplicateTitle(DUPLICATE_TITLE.to_string()));
        }

        current.title = news.title;
        current.body = news.body;
        current.author_id = news.author_id;

        let linked = self
            .repo
            .get_tag_ids(current.id)
            .await
            .with_context(|| format!("Failed to get tags of news {}", current.id))?;
        let changes = reconcile_tags(&linked, tag_ids);

        self.repo
            .update_with_tags(&current, &changes)
            .await
            .with_context(|| format!("Failed to update news {}", current.id))?;

        Ok(())
    }

    /// Delete a news item together with its tag links.
    ///
    /// # Errors
    /// - `NotFound` if the id is unknown
    /// - `LinkedEntity` if storage refuses because of a foreign key
    pub async fn delete(&self, id: i64) -> Result<(), NewsServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .with_context(|| format!("Failed to get news {}", id))?
            .ok_or_else(|| NewsServiceError::NotFound(NOT_FOUND.to_string()))?;

        match self.repo.delete(id).await {
            Ok(()) => Ok(()),
            Err(e) if is_foreign_key_violation(&e) => {
                Err(NewsServiceError::LinkedEntity(LINKED.to_string()))
            }
            Err(e) => Err(e.context(format!("Failed to delete news {}", id)).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxNewsRepository, SqlxTagRepository, SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations, sqlite_pool, DynDatabasePool};
    use crate::models::{Tag, User};
    use crate::services::{TagService, TagServiceError, UserService, UserServiceError};
    use async_trait::async_trait;

    struct Services {
        pool: DynDatabasePool,
        news: NewsService,
        tags: TagService,
        users: UserService,
    }

    async fn setup_test_services() -> Services {
        let pool = create_test_pool()
            .await
            .expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        Services {
            news: NewsService::new(SqlxNewsRepository::boxed(pool.clone())),
            tags: TagService::new(SqlxTagRepository::boxed(pool.clone())),
            users: UserService::new(SqlxUserRepository::boxed(pool.clone())),
            pool,
        }
    }

    async fn seed_author(s: &Services) -> i64 {
        s.users
            .create(User::new("Ana".into(), "secret".into(), "ana@example.com".into()))
            .await
            .expect("Failed to create user")
            .id
    }

    async fn seed_tags(s: &Services, descriptions: &[&str]) -> Vec<i64> {
        let mut ids = Vec::new();
        for d in descriptions {
            ids.push(s.tags.create(Tag::new(d.to_string())).await.expect("Failed to create tag").id);
        }
        ids
    }

    async fn link_count(pool: &DynDatabasePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM news_tags")
            .fetch_one(sqlite_pool(&pool))
            .await
            .unwrap()
    }

    // ========================================================================
    // reconcile_tags
    // ========================================================================

    #[test]
    fn test_reconcile_tags_diff() {
        let changes = reconcile_tags(&[1, 2, 3], &[2, 3, 4, 4]);
        assert_eq!(changes.added, vec![4]);
        assert_eq!(changes.removed, vec![1]);
    }

    #[test]
    fn test_reconcile_tags_to_empty() {
        let changes = reconcile_tags(&[5, 6], &[]);
        assert!(changes.added.is_empty());
        assert_eq!(changes.removed, vec![5, 6]);
    }

    #[test]
    fn test_reconcile_same_set_is_empty() {
        assert!(reconcile_tags(&[3, 1], &[1, 3, 1]).is_empty());
    }

    // ========================================================================
    // Service operations
    // ========================================================================

    #[tokio::test]
    async fn test_create_news_with_distinct_tags() {
        let s = setup_test_services().await;
        let author = seed_author(&s).await;
        let tags = seed_tags(&s, &["Politics", "Sports"]).await;

        let id = s
            .news
            .create(
                News::new("Title A".into(), "Body".into(), author),
                &[tags[0], tags[1], tags[0]],
            )
            .await
            .expect("Failed to create news");

        let edit = s.news.get_for_edit(id).await.unwrap().unwrap();
        assert_eq!(edit.news.title, "Title A");
        assert_eq!(edit.tag_ids, vec![tags[0], tags[1]]);

        let full = s.news.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(full.author.id, author);
        assert_eq!(full.tags.len(), 2);
    }

    #[tokio::test]
    async fn test_create_duplicate_title_fails() {
        let s = setup_test_services().await;
        let author = seed_author(&s).await;
        s.news
            .create(News::new("Title A".into(), "Body".into(), author), &[])
            .await
            .unwrap();

        let result = s
            .news
            .create(News::new("Title A".into(), "Other".into(), author), &[])
            .await;

        assert!(matches!(result, Err(NewsServiceError::DuplicateTitle(_))));
    }

    #[tokio::test]
    async fn test_create_with_unknown_tag_fails_without_side_effects() {
        let s = setup_test_services().await;
        let author = seed_author(&s).await;

        let result = s
            .news
            .create(News::new("Title A".into(), "Body".into(), author), &[777])
            .await;

        assert!(matches!(result, Err(NewsServiceError::InternalError(_))));
        assert!(s.news.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_news_reconciles_tags() {
        let s = setup_test_services().await;
        let author = seed_author(&s).await;
        let tags = seed_tags(&s, &["A", "B", "C"]).await;
        let id = s
            .news
            .create(News::new("Title A".into(), "Body".into(), author), &[tags[0], tags[1]])
            .await
            .unwrap();

        let mut changed = News::new("Title A2".into(), "Body 2".into(), author);
        changed.id = id;
        s.news
            .update(changed, &[tags[1], tags[2]])
            .await
            .expect("Failed to update news");

        let edit = s.news.get_for_edit(id).await.unwrap().unwrap();
        assert_eq!(edit.news.title, "Title A2");
        assert_eq!(edit.news.body, "Body 2");
        assert_eq!(edit.tag_ids, vec![tags[1], tags[2]]);
    }

    #[tokio::test]
    async fn test_update_missing_or_duplicate_title_fails() {
        let s = setup_test_services().await;
        let author = seed_author(&s).await;

        let mut ghost = News::new("Ghost".into(), "Body".into(), author);
        ghost.id = 404;
        assert!(matches!(
            s.news.update(ghost, &[]).await,
            Err(NewsServiceError::NotFound(_))
        ));

        s.news
            .create(News::new("Title A".into(), "Body".into(), author), &[])
            .await
            .unwrap();
        let b = s
            .news
            .create(News::new("Title B".into(), "Body".into(), author), &[])
            .await
            .unwrap();

        let mut clash = News::new("Title A".into(), "Body".into(), author);
        clash.id = b;
        assert!(matches!(
            s.news.update(clash, &[]).await,
            Err(NewsServiceError::DuplicateTitle(_))
        ));

        // Keeping its own title is fine
        let mut same = News::new("Title B".into(), "New body".into(), author);
        same.id = b;
        s.news.update(same, &[]).await.expect("own title must be accepted");
    }

    #[tokio::test]
    async fn test_delete_news_cascades_links() {
        let s = setup_test_services().await;
        let author = seed_author(&s).await;
        let tags = seed_tags(&s, &["A", "B"]).await;
        let id = s
            .news
            .create(News::new("Title A".into(), "Body".into(), author), &tags)
            .await
            .unwrap();
        assert_eq!(link_count(&s.pool).await, 2);

        s.news.delete(id).await.expect("Failed to delete news");

        assert_eq!(link_count(&s.pool).await, 0);
        assert!(s.news.get_by_id(id).await.unwrap().is_none());
        assert!(matches!(
            s.news.delete(id).await,
            Err(NewsServiceError::NotFound(_))
        ));
        // Tags are free again
        s.tags.delete(tags[0]).await.expect("unused tag must be deletable");
    }

    /// News repository whose delete trips a foreign key, as if a row outside
    /// the join table still pointed at the news item.
    struct ReferencedNewsRepo {
        inner: Arc<dyn NewsRepository>,
        pool: DynDatabasePool,
        author_id: i64,
    }

    #[async_trait]
    impl NewsRepository for ReferencedNewsRepo {
        async fn list_with_relations(&self) -> anyhow::Result<Vec<NewsWithRelations>> {
            self.inner.list_with_relations().await
        }
        async fn get_with_relations(&self, id: i64) -> anyhow::Result<Option<NewsWithRelations>> {
            self.inner.get_with_relations(id).await
        }
        async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<News>> {
            self.inner.get_by_id(id).await
        }
        async fn get_tag_ids(&self, id: i64) -> anyhow::Result<Vec<i64>> {
            self.inner.get_tag_ids(id).await
        }
        async fn exists_with_title(&self, title: &str) -> anyhow::Result<bool> {
            self.inner.exists_with_title(title).await
        }
        async fn exists_other_with_title(&self, id: i64, title: &str) -> anyhow::Result<bool> {
            self.inner.exists_other_with_title(id, title).await
        }
        async fn create_with_tags(&self, news: &News, tag_ids: &[i64]) -> anyhow::Result<News> {
            self.inner.create_with_tags(news, tag_ids).await
        }
        async fn update_with_tags(&self, news: &News, changes: &TagChanges) -> anyhow::Result<()> {
            self.inner.update_with_tags(news, changes).await
        }
        async fn delete(&self, id: i64) -> anyhow::Result<()> {
            // The author row is referenced by the news item, so storage refuses
            sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(self.author_id)
                .execute(sqlite_pool(&self.pool))
                .await
                .with_context(|| format!("Failed to delete news {}", id))?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_delete_maps_foreign_key_violation_to_linked_entity() {
        let s = setup_test_services().await;
        let author = seed_author(&s).await;
        let tags = seed_tags(&s, &["A"]).await;
        let id = s
            .news
            .create(News::new("Title A".into(), "Body".into(), author), &tags)
            .await
            .unwrap();
        let service = NewsService::new(Arc::new(ReferencedNewsRepo {
            inner: SqlxNewsRepository::boxed(s.pool.clone()),
            pool: s.pool.clone(),
            author_id: author,
        }));

        let result = service.delete(id).await;

        match result {
            Err(NewsServiceError::LinkedEntity(msg)) => assert_eq!(msg, LINKED),
            other => panic!("expected LinkedEntity, got {:?}", other),
        }
        assert!(s.news.get_by_id(id).await.unwrap().is_some());
    }

    /// Walk through the documented scenario end to end.
    #[tokio::test]
    async fn test_politics_scenario() {
        let s = setup_test_services().await;
        let author = seed_author(&s).await;

        let politics = s.tags.create(Tag::new("Politics".into())).await.unwrap();
        assert_eq!(politics.id, 1);
        assert!(matches!(
            s.tags.create(Tag::new("Politics".into())).await,
            Err(TagServiceError::DuplicateDescription(_))
        ));

        let a = s
            .news
            .create(News::new("Title A".into(), "Body".into(), author), &[politics.id])
            .await
            .expect("Title A should be created");

        let mut edit = News::new("Title A".into(), "Body".into(), author);
        edit.id = a;
        s.news.update(edit, &[]).await.unwrap();
        assert!(s.news.get_for_edit(a).await.unwrap().unwrap().tag_ids.is_empty());

        s.news
            .create(News::new("Title B".into(), "Body".into(), author), &[politics.id])
            .await
            .unwrap();
        assert!(matches!(
            s.tags.delete(politics.id).await,
            Err(TagServiceError::InUse(_))
        ));

        // The author still has news, so storage refuses the delete
        assert!(matches!(
            s.users.delete(author).await,
            Err(UserServiceError::InternalError(_))
        ));
    }

    // ========================================================================
    // Property-Based Tests
    // ========================================================================

    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Applying the computed changes to the current set yields exactly
        /// the requested set, and recomputing afterwards yields no changes.
        #[test]
        fn property_reconcile_reaches_requested_set(
            current in proptest::collection::btree_set(1i64..20, 0..10),
            requested in proptest::collection::vec(1i64..20, 0..15),
        ) {
            let current: Vec<i64> = current.into_iter().collect();
            let changes = reconcile_tags(&current, &requested);

            let mut result: BTreeSet<i64> = current.iter().copied().collect();
            for id in &changes.removed {
                prop_assert!(result.remove(id), "removed id {} was not linked", id);
            }
            for id in &changes.added {
                prop_assert!(result.insert(*id), "added id {} was already linked", id);
            }

            let expected: BTreeSet<i64> = requested.iter().copied().collect();
            prop_assert_eq!(&result, &expected);

            let after: Vec<i64> = result.into_iter().collect();
            prop_assert!(reconcile_tags(&after, &requested).is_empty());
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// For any sequence of tag selections, the stored links always equal
        /// the last requested distinct set, and repeating an update is a no-op.
        #[test]
        fn property_update_links_match_request(
            initial in proptest::collection::vec(0usize..5, 0..6),
            updates in proptest::collection::vec(proptest::collection::vec(0usize..5, 0..8), 1..4),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let s = setup_test_services().await;
                let author = seed_author(&s).await;
                let tags = seed_tags(&s, &["T0", "T1", "T2", "T3", "T4"]).await;
                let pick = |idx: &[usize]| idx.iter().map(|i| tags[*i]).collect::<Vec<i64>>();

                let id = s
                    .news
                    .create(News::new("Title".into(), "Body".into(), author), &pick(&initial))
                    .await
                    .expect("create should succeed");

                for selection in &updates {
                    let requested = pick(selection);
                    for _ in 0..2 {
                        let mut news = News::new("Title".into(), "Body".into(), author);
                        news.id = id;
                        s.news.update(news, &requested).await.expect("update should succeed");

                        let stored = s.news.get_for_edit(id).await.unwrap().unwrap().tag_ids;
                        let expected: Vec<i64> =
                            requested.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
                        prop_assert_eq!(stored, expected);
                    }
                }

                Ok(())
            });
            result?;
        }
    }
}
