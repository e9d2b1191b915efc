pub const DENSE_VECTOR_NAME: &str = "dense";
pub const BM25_VECTOR_NAME: &str = "bm25";
pub const BM25_MODEL: &str = "qdrant/bm25";

const SCROLL_BATCH: u32 = 256;
/// Relevance candidates gathered per requested hit before rescoring.
const CANDIDATE_FACTOR: u64 = 4;
/// BM25 score at which the lexical share reaches one half.
const BM25_HALF_SCORE: f32 = 1.0;

use std::collections::{HashMap, HashSet};

use qdrant_client::{
	Qdrant,
	client::Payload,
	qdrant::{
		Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
		DeletePointsBuilder, Direction, Distance, Document, FieldType, Filter, GetPointsBuilder,
		ListValue, Modifier, OrderBy, PayloadIncludeSelector, PointId, PointStruct, PointsIdsList,
		PrefetchQueryBuilder, Query, QueryPointsBuilder, Range, ScrollPointsBuilder,
		SearchParamsBuilder, SparseVectorParamsBuilder, SparseVectorsConfigBuilder, Struct,
		UpsertPointsBuilder, Value, Vector, VectorParamsBuilder, VectorsConfigBuilder,
		point_id::PointIdOptions, value::Kind,
		with_payload_selector::SelectorOptions,
	},
};
use serde_json::{Map, Number, Value as JsonValue};
use uuid::Uuid;

use crate::{
	BatchReport, BoxFuture, Error, Fusion, HybridQuery, ItemStatus, Projection, QueryOrder,
	QueryPage, Result, SearchHit, SearchIndex, hybrid_score,
};
use clinote_domain::{DocumentKey, IndexedDocument, StoredDocument, fields};

pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &clinote_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Creates the collection with dense and BM25 vectors plus payload indexes, unless it
	/// already exists.
	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(&self.collection).await? {
			return Ok(());
		}

		let mut vectors_config = VectorsConfigBuilder::default();

		vectors_config.add_named_vector_params(
			DENSE_VECTOR_NAME,
			VectorParamsBuilder::new(self.vector_dim.into(), Distance::Cosine),
		);

		let mut sparse_vectors_config = SparseVectorsConfigBuilder::default();

		sparse_vectors_config.add_named_vector_params(
			BM25_VECTOR_NAME,
			SparseVectorParamsBuilder::default().modifier(Modifier::Idf as i32),
		);

		self.client
			.create_collection(
				CreateCollectionBuilder::new(self.collection.clone())
					.vectors_config(vectors_config)
					.sparse_vectors_config(sparse_vectors_config),
			)
			.await?;

		let indexes = fields::INTEGER
			.iter()
			.map(|field| (*field, FieldType::Integer))
			.chain(fields::KEYWORD.iter().map(|field| (*field, FieldType::Keyword)));

		for (field, field_type) in indexes {
			self.client
				.create_field_index(
					CreateFieldIndexCollectionBuilder::new(
						self.collection.clone(),
						field,
						field_type,
					)
					.wait(true),
				)
				.await?;
		}

		tracing::info!(collection = %self.collection, "Qdrant collection created.");

		Ok(())
	}

	pub async fn drop_collection(&self) -> Result<()> {
		if self.client.collection_exists(&self.collection).await? {
			self.client.delete_collection(self.collection.clone()).await?;

			tracing::info!(collection = %self.collection, "Qdrant collection dropped.");
		}

		Ok(())
	}

	async fn upsert_documents(&self, docs: &[IndexedDocument]) -> Result<BatchReport> {
		let mut items = Vec::with_capacity(docs.len());
		let mut points = Vec::with_capacity(docs.len());
		let mut sent = Vec::with_capacity(docs.len());

		for doc in docs {
			match build_point(doc) {
				Ok(point) => {
					points.push(point);
					sent.push(doc.document_id.clone());
				},
				Err(err) => items.push(ItemStatus {
					document_id: doc.document_id.clone(),
					error: Some(err.to_string()),
				}),
			}
		}

		if !points.is_empty() {
			let upsert = UpsertPointsBuilder::new(self.collection.clone(), points).wait(true);

			self.client.upsert_points(upsert).await?;
		}

		items.extend(BatchReport::all_succeeded(sent).items);

		Ok(BatchReport { items })
	}

	async fn delete_documents(&self, document_ids: &[String]) -> Result<BatchReport> {
		if document_ids.is_empty() {
			return Ok(BatchReport::default());
		}

		let ids = document_ids.iter().map(|id| point_id_for(id)).collect::<Vec<_>>();
		let delete = DeletePointsBuilder::new(self.collection.clone())
			.points(PointsIdsList { ids })
			.wait(true);

		self.client.delete_points(delete).await?;

		Ok(BatchReport::all_succeeded(document_ids.iter().cloned()))
	}

	async fn record_document_ids(&self, record_id: i64) -> Result<Vec<String>> {
		let filter = Filter::must([Condition::matches(fields::RECORD_ID, record_id)]);
		let mut out = Vec::new();
		let mut offset: Option<PointId> = None;

		loop {
			let mut scroll = ScrollPointsBuilder::new(self.collection.clone())
				.filter(filter.clone())
				.limit(SCROLL_BATCH)
				.with_payload(include_fields(&[fields::DOCUMENT_ID]))
				.with_vectors(false);

			if let Some(offset) = offset.take() {
				scroll = scroll.offset(offset);
			}

			let response = self.client.scroll(scroll).await?;

			for point in response.result {
				if let Some(id) = point.payload.get(fields::DOCUMENT_ID).and_then(payload_str) {
					out.push(id.to_string());
				}
			}

			match response.next_page_offset {
				Some(next) => offset = Some(next),
				None => break,
			}
		}

		tracing::trace!(record_id, ids = ?out, "Existing documents listed.");

		Ok(out)
	}

	async fn query_documents(&self, query: &HybridQuery) -> Result<QueryPage> {
		if query.top == 0 {
			return Err(Error::InvalidArgument("Query top must be greater than zero.".to_string()));
		}
		if query.vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Query vector has {} dimensions, expected {}.",
				query.vector.len(),
				self.vector_dim
			)));
		}

		let total_count = self.count_documents().await?;
		let hits = match query.order {
			QueryOrder::Relevance => self.relevance_page(query).await?,
			QueryOrder::Key { after } => self.key_page(query, after).await?,
		};

		Ok(QueryPage { hits, total_count })
	}

	/// Gathers `top × CANDIDATE_FACTOR` candidates with the configured fusion, then ranks them by
	/// their absolute hybrid score.
	async fn relevance_page(&self, query: &HybridQuery) -> Result<Vec<SearchHit>> {
		let limit = u64::from(query.top) * CANDIDATE_FACTOR;
		let search = fusion_query(&self.collection, query, limit)
			.with_payload(payload_selector(query.projection));
		let points = self.client.query(search).await?.result;
		let ids = points.iter().filter_map(|point| point.id.clone()).collect::<Vec<_>>();
		let scores = self.score_points(query, ids).await?;
		let mut hits = Vec::with_capacity(points.len());

		for point in points {
			hits.push(SearchHit {
				score: score_of(&scores, point.id.as_ref()),
				document: StoredDocument::from_payload(&payload_to_json(point.payload))?,
			});
		}

		hits.sort_by(|a, b| {
			b.score.total_cmp(&a.score).then_with(|| a.document.key.cmp(&b.document.key))
		});
		hits.truncate(query.top as usize);

		Ok(hits)
	}

	/// Takes the next `top` documents in key order, then scores exactly those documents.
	/// Documents neither retriever matches score zero.
	async fn key_page(
		&self,
		query: &HybridQuery,
		after: Option<DocumentKey>,
	) -> Result<Vec<SearchHit>> {
		let mut conditions = Vec::new();

		if let Some(after) = after {
			conditions.push(Condition::range(
				fields::CHUNK_KEY,
				Range { gt: Some(after.chunk_key()? as f64), ..Default::default() },
			));
		}

		let scroll = ScrollPointsBuilder::new(self.collection.clone())
			.filter(Filter::must(conditions))
			.limit(query.top)
			.with_payload(payload_selector(query.projection))
			.with_vectors(false)
			.order_by(OrderBy {
				key: fields::CHUNK_KEY.to_string(),
				direction: Some(Direction::Asc as i32),
				start_from: None,
			});
		let points = self.client.scroll(scroll).await?.result;
		let ids = points.iter().filter_map(|point| point.id.clone()).collect::<Vec<_>>();
		let scores = self.score_points(query, ids).await?;
		let mut hits = Vec::with_capacity(points.len());

		for point in points {
			hits.push(SearchHit {
				score: score_of(&scores, point.id.as_ref()),
				document: StoredDocument::from_payload(&payload_to_json(point.payload))?,
			});
		}

		Ok(hits)
	}

	/// Absolute hybrid scores of `ids`, keyed by point id. Each retriever is queried separately
	/// over exactly these points, so a score depends only on the query and its document.
	async fn score_points(
		&self,
		query: &HybridQuery,
		ids: Vec<PointId>,
	) -> Result<HashMap<String, f32>> {
		if ids.is_empty() {
			return Ok(HashMap::new());
		}

		let limit = ids.len() as u64;
		let filter = Filter::must([Condition::has_id(ids)]);
		let dense = self
			.retriever_scores(
				QueryPointsBuilder::new(self.collection.clone())
					.query(Query::new_nearest(query.vector.clone()))
					.using(DENSE_VECTOR_NAME)
					.filter(filter.clone())
					.params(SearchParamsBuilder::default().exact(true))
					.limit(limit),
			)
			.await?;
		let bm25 = self
			.retriever_scores(
				QueryPointsBuilder::new(self.collection.clone())
					.query(Query::new_nearest(Document::new(query.text.clone(), BM25_MODEL)))
					.using(BM25_VECTOR_NAME)
					.filter(filter)
					.limit(limit),
			)
			.await?;
		let keys = dense.keys().chain(bm25.keys()).cloned().collect::<HashSet<_>>();

		Ok(keys
			.into_iter()
			.map(|key| {
				let dense = dense.get(&key).copied().unwrap_or(0.0);
				let lexical = bm25_share(bm25.get(&key).copied().unwrap_or(0.0));

				(key, hybrid_score(dense, lexical))
			})
			.collect())
	}

	async fn retriever_scores(&self, search: QueryPointsBuilder) -> Result<HashMap<String, f32>> {
		let response = self.client.query(search.with_payload(false)).await?;

		Ok(response
			.result
			.into_iter()
			.filter_map(|point| Some((point_id_key(point.id.as_ref()?)?, point.score)))
			.collect())
	}

	async fn count_documents(&self) -> Result<u64> {
		let response =
			self.client.count(CountPointsBuilder::new(self.collection.clone()).exact(true)).await?;

		Ok(response.result.map(|result| result.count).unwrap_or(0))
	}

	async fn fetch_documents(&self, document_ids: &[String]) -> Result<Vec<StoredDocument>> {
		if document_ids.is_empty() {
			return Ok(Vec::new());
		}

		let ids = document_ids.iter().map(|id| point_id_for(id)).collect::<Vec<_>>();
		let response = self
			.client
			.get_points(GetPointsBuilder::new(self.collection.clone(), ids).with_payload(true))
			.await?;

		response
			.result
			.into_iter()
			.map(|point| Ok(StoredDocument::from_payload(&payload_to_json(point.payload))?))
			.collect()
	}
}
impl SearchIndex for QdrantStore {
	fn upsert<'a>(&'a self, docs: &'a [IndexedDocument]) -> BoxFuture<'a, Result<BatchReport>> {
		Box::pin(self.upsert_documents(docs))
	}

	fn delete<'a>(&'a self, document_ids: &'a [String]) -> BoxFuture<'a, Result<BatchReport>> {
		Box::pin(self.delete_documents(document_ids))
	}

	fn document_ids_for_record(&self, record_id: i64) -> BoxFuture<'_, Result<Vec<String>>> {
		Box::pin(self.record_document_ids(record_id))
	}

	fn query<'a>(&'a self, query: &'a HybridQuery) -> BoxFuture<'a, Result<QueryPage>> {
		Box::pin(self.query_documents(query))
	}

	fn fetch<'a>(
		&'a self,
		document_ids: &'a [String],
	) -> BoxFuture<'a, Result<Vec<StoredDocument>>> {
		Box::pin(self.fetch_documents(document_ids))
	}
}

/// Point ids are name-based UUIDs of the document id, so re-upserting a chunk overwrites it.
pub fn point_id_for(document_id: &str) -> PointId {
	PointId::from(Uuid::new_v5(&Uuid::NAMESPACE_OID, document_id.as_bytes()).to_string())
}

fn build_point(doc: &IndexedDocument) -> Result<PointStruct> {
	let payload = doc
		.payload()?
		.into_iter()
		.map(|(key, value)| (key, json_to_value(value)))
		.collect::<HashMap<_, _>>();
	let mut vector_map = HashMap::new();

	if let Some(vec) = doc.vector.as_ref() {
		vector_map.insert(DENSE_VECTOR_NAME.to_string(), Vector::from(vec.clone()));
	}
	if !doc.chunk_text.trim().is_empty() {
		vector_map.insert(
			BM25_VECTOR_NAME.to_string(),
			Vector::from(Document::new(doc.chunk_text.clone(), BM25_MODEL)),
		);
	}

	Ok(PointStruct::new(point_id_for(&doc.document_id), vector_map, Payload::from(payload)))
}

fn fusion_query(collection: &str, query: &HybridQuery, limit: u64) -> QueryPointsBuilder {
	let dense_prefetch = PrefetchQueryBuilder::default()
		.query(Query::new_nearest(query.vector.clone()))
		.using(DENSE_VECTOR_NAME)
		.limit(limit);
	let bm25_prefetch = PrefetchQueryBuilder::default()
		.query(Query::new_nearest(Document::new(query.text.clone(), BM25_MODEL)))
		.using(BM25_VECTOR_NAME)
		.limit(limit);
	let fusion = match query.fusion {
		Fusion::Rrf => qdrant_client::qdrant::Fusion::Rrf,
		Fusion::Dbsf => qdrant_client::qdrant::Fusion::Dbsf,
	};

	QueryPointsBuilder::new(collection.to_string())
		.add_prefetch(dense_prefetch)
		.add_prefetch(bm25_prefetch)
		.query(fusion)
		.limit(limit)
}

/// Maps an unbounded BM25 score into `[0, 1)`.
fn bm25_share(score: f32) -> f32 {
	let score = score.max(0.0);

	score / (score + BM25_HALF_SCORE)
}

fn score_of(scores: &HashMap<String, f32>, id: Option<&PointId>) -> f32 {
	id.and_then(point_id_key).and_then(|key| scores.get(&key).copied()).unwrap_or(0.0)
}

fn include_fields(names: &[&str]) -> SelectorOptions {
	SelectorOptions::Include(PayloadIncludeSelector {
		fields: names.iter().map(|name| name.to_string()).collect(),
	})
}

fn payload_selector(projection: Projection) -> SelectorOptions {
	match projection {
		Projection::Minimal => include_fields(&fields::MINIMAL),
		Projection::Full => SelectorOptions::Enable(true),
	}
}

fn point_id_key(id: &PointId) -> Option<String> {
	match id.point_id_options.as_ref()? {
		PointIdOptions::Uuid(uuid) => Some(uuid.clone()),
		PointIdOptions::Num(num) => Some(num.to_string()),
	}
}

fn payload_str(value: &Value) -> Option<&str> {
	match value.kind.as_ref()? {
		Kind::StringValue(text) => Some(text.as_str()),
		_ => None,
	}
}

fn json_to_value(value: JsonValue) -> Value {
	let kind = match value {
		JsonValue::Null => Kind::NullValue(0),
		JsonValue::Bool(flag) => Kind::BoolValue(flag),
		JsonValue::Number(number) => match number.as_i64() {
			Some(integer) => Kind::IntegerValue(integer),
			None => Kind::DoubleValue(number.as_f64().unwrap_or_default()),
		},
		JsonValue::String(text) => Kind::StringValue(text),
		JsonValue::Array(items) =>
			Kind::ListValue(ListValue { values: items.into_iter().map(json_to_value).collect() }),
		JsonValue::Object(object) => Kind::StructValue(Struct {
			fields: object.into_iter().map(|(key, value)| (key, json_to_value(value))).collect(),
		}),
	};

	Value { kind: Some(kind) }
}

fn payload_to_json(payload: HashMap<String, Value>) -> Map<String, JsonValue> {
	payload.into_iter().map(|(key, value)| (key, value_to_json(value))).collect()
}

fn value_to_json(value: Value) -> JsonValue {
	match value.kind {
		Some(Kind::NullValue(_)) | None => JsonValue::Null,
		Some(Kind::BoolValue(flag)) => JsonValue::Bool(flag),
		Some(Kind::IntegerValue(number)) => JsonValue::from(number),
		Some(Kind::DoubleValue(number)) =>
			Number::from_f64(number).map(JsonValue::Number).unwrap_or(JsonValue::Null),
		Some(Kind::StringValue(text)) => JsonValue::String(text),
		Some(Kind::ListValue(list)) =>
			JsonValue::Array(list.values.into_iter().map(value_to_json).collect()),
		Some(Kind::StructValue(object)) => JsonValue::Object(payload_to_json(object.fields)),
	}
}
