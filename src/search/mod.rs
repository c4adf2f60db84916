//! Tantivy-based participant search index.
//!
//! Lets the dashboard find a swimmer by name, ID number or phone.

use std::path::Path;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, Occur, Query, QueryParser};
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::Participant;

const BOOST_LAST_NAME: f32 = 10.0;
const BOOST_FIRST_NAME: f32 = 8.0;
const BOOST_ID_NUMBER: f32 = 6.0;
const BOOST_PHONE: f32 = 4.0;

/// Search result with participant and relevance score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub participant_id: String,
    pub score: f32,
}

struct SearchFields {
    participant_id: Field,
    first_name: Field,
    last_name: Field,
    id_number: Field,
    phone: Field,
}

/// Tantivy search index for participants.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<RwLock<IndexWriter>>,
    fields: SearchFields,
}

impl SearchIndex {
    /// Create or open a search index at the specified path.
    pub fn open(index_path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(index_path)
            .map_err(|e| AppError::Search(format!("Failed to create index directory: {}", e)))?;

        let mut schema_builder = Schema::builder();
        // Raw, untokenized ids so documents can be replaced by term.
        let participant_id = schema_builder.add_text_field("participant_id", STRING | STORED);
        let first_name = schema_builder.add_text_field("first_name", TEXT);
        let last_name = schema_builder.add_text_field("last_name", TEXT);
        let id_number = schema_builder.add_text_field("id_number", TEXT);
        let phone = schema_builder.add_text_field("phone", TEXT);
        let schema = schema_builder.build();

        let fields = SearchFields {
            participant_id,
            first_name,
            last_name,
            id_number,
            phone,
        };

        let index = Index::open_in_dir(index_path)
            .or_else(|_| Index::create_in_dir(index_path, schema.clone()))
            .map_err(|e| AppError::Search(format!("Failed to open/create index: {}", e)))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| AppError::Search(format!("Failed to create reader: {}", e)))?;

        let writer = index
            .writer(50_000_000)
            .map_err(|e| AppError::Search(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            index,
            reader,
            writer: Arc::new(RwLock::new(writer)),
            fields,
        })
    }

    /// Rebuild the entire index from the participant table.
    pub async fn rebuild(&self, participants: &[Participant]) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_all_documents()?;
        for participant in participants {
            writer.add_document(self.create_document(participant))?;
        }
        writer.commit()?;

        self.reader.reload()?;

        tracing::info!("Search index rebuilt with {} participants", participants.len());
        Ok(())
    }

    /// Index or re-index a single participant.
    pub async fn index_participant(&self, participant: &Participant) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_term(Term::from_field_text(
            self.fields.participant_id,
            &participant.id,
        ));
        writer.add_document(self.create_document(participant))?;
        writer.commit()?;

        self.reader.reload()?;
        Ok(())
    }

    /// Remove a participant from the index.
    pub async fn remove_participant(&self, participant_id: &str) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_term(Term::from_field_text(
            self.fields.participant_id,
            participant_id,
        ));
        writer.commit()?;

        self.reader.reload()?;
        Ok(())
    }

    /// Search participants. Malformed query syntax is parsed leniently.
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<SearchResult>, AppError> {
        if query_str.trim().is_empty() {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();

        let field_boosts = [
            (self.fields.last_name, BOOST_LAST_NAME),
            (self.fields.first_name, BOOST_FIRST_NAME),
            (self.fields.id_number, BOOST_ID_NUMBER),
            (self.fields.phone, BOOST_PHONE),
        ];

        let subqueries: Vec<(Occur, Box<dyn Query>)> = field_boosts
            .into_iter()
            .map(|(field, boost)| {
                let mut parser = QueryParser::for_index(&self.index, vec![field]);
                parser.set_conjunction_by_default();
                let (query, _errors) = parser.parse_query_lenient(query_str);
                (
                    Occur::Should,
                    Box::new(BoostQuery::new(query, boost)) as Box<dyn Query>,
                )
            })
            .collect();
        let combined = BooleanQuery::new(subqueries);

        let top_docs = searcher
            .search(&combined, &TopDocs::with_limit(limit))
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let results = top_docs
            .into_iter()
            .filter_map(|(score, doc_address)| {
                let doc: TantivyDocument = searcher.doc(doc_address).ok()?;
                let participant_id = doc
                    .get_first(self.fields.participant_id)?
                    .as_str()?
                    .to_string();
                Some(SearchResult {
                    participant_id,
                    score,
                })
            })
            .collect();

        Ok(results)
    }

    fn create_document(&self, participant: &Participant) -> TantivyDocument {
        doc!(
            self.fields.participant_id => participant.id.clone(),
            self.fields.first_name => participant.first_name.clone(),
            self.fields.last_name => participant.last_name.clone(),
            self.fields.id_number => participant.id_number.clone(),
            self.fields.phone => participant.phone.clone()
        )
    }
}
