use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::codec::EntityCodec;
use crate::core::KvScan;
use crate::error::{StorageError, StorageResult};
use crate::key::{EntityPath, TypeTag, decode_path_bytes};

/// An entity together with the path it is stored at.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntity<E> {
    /// Address of the record.
    pub path: EntityPath,
    /// Decoded payload.
    pub entity: E,
}

impl<E> StoredEntity<E> {
    /// Discards the path.
    pub fn into_entity(self) -> E {
        self.entity
    }
}

/// Lazy stream of entities of one type under a key prefix.
///
/// Records of other types under the same prefix are skipped. A record whose
/// key or payload does not decode is yielded as an error; the stream can be
/// resumed past it. Dropping the stream releases the underlying scan.
pub struct EntityStream<E, C> {
    scan: KvScan,
    codec: Arc<C>,
    type_tag: TypeTag,
    _entity: PhantomData<fn() -> E>,
}

impl<E, C> EntityStream<E, C> {
    pub(crate) fn new(scan: KvScan, codec: Arc<C>, type_tag: TypeTag) -> Self {
        Self {
            scan,
            codec,
            type_tag,
            _entity: PhantomData,
        }
    }

    /// Returns the type tag this stream yields.
    pub fn type_tag(&self) -> &TypeTag {
        &self.type_tag
    }
}

impl<E, C> EntityStream<E, C>
where
    C: EntityCodec<E>,
{
    /// Yields only the paths, without decoding payloads.
    pub fn paths(self) -> impl Iterator<Item = StorageResult<EntityPath>> {
        let type_tag = self.type_tag;
        self.scan.filter_map(move |item| {
            let (key, _) = match item {
                Ok(pair) => pair,
                Err(e) => return Some(Err(e.into())),
            };
            match decode_path_bytes(&key) {
                Ok(path) if path.leaf_type() == Some(&type_tag) => Some(Ok(path)),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            }
        })
    }
}

impl<E, C> fmt::Debug for EntityStream<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStream")
            .field("type_tag", &self.type_tag)
            .finish_non_exhaustive()
    }
}

impl<E, C> Iterator for EntityStream<E, C>
where
    C: EntityCodec<E>,
{
    type Item = StorageResult<StoredEntity<E>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (key, bytes) = match self.scan.next()? {
                Ok(pair) => pair,
                Err(e) => return Some(Err(e.into())),
            };
            let path = match decode_path_bytes(&key) {
                Ok(path) => path,
                Err(e) => return Some(Err(e)),
            };
            if path.leaf_type() != Some(&self.type_tag) {
                continue;
            }
            return Some(match self.codec.decode(&bytes, &self.type_tag) {
                Ok(entity) => Ok(StoredEntity { path, entity }),
                Err(e) => Err(StorageError::Decode {
                    key: String::from_utf8_lossy(&key).into_owned(),
                    bytes,
                    message: e.message,
                }),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde::{Deserialize, Serialize};

    use crate::backends::MemoryBackend;
    use crate::core::KvBackend;
    use crate::error::StorageError;
    use crate::key::{EntityPath, TypeTag};
    use crate::store::{ENTITY_KEYSPACE, EntityStore};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        n: u32,
    }

    fn fixture() -> (MemoryBackend, EntityStore<Record>) {
        let backend = MemoryBackend::new().with_scan_batch_size(2);
        let store = EntityStore::new(Arc::new(backend.clone()));
        let p1 = EntityPath::new("Patient", "P1");
        let p2 = EntityPath::new("Patient", "P2");
        store.save(&p1, &Record { n: 1 }).unwrap();
        store.save(&p1.child("Encounter", "E1"), &Record { n: 11 }).unwrap();
        store.save(&p1.child("Encounter", "E2"), &Record { n: 12 }).unwrap();
        store.save(&p2, &Record { n: 2 }).unwrap();
        store.save(&p2.child("Encounter", "E3"), &Record { n: 23 }).unwrap();
        (backend, store)
    }

    #[test]
    fn test_stream_filters_by_prefix_and_type() {
        let (_, store) = fixture();
        let found: Vec<u32> = store
            .stream(&EntityPath::new("Patient", "P1"), &TypeTag::new("Encounter"))
            .unwrap()
            .map(|r| r.unwrap().entity.n)
            .collect();
        assert_eq!(found, vec![11, 12]);
    }

    #[test]
    fn test_stream_all_by_type() {
        let (_, store) = fixture();
        let patients: Vec<EntityPath> = store
            .stream_all(&TypeTag::new("Patient"))
            .unwrap()
            .paths()
            .map(Result::unwrap)
            .collect();
        assert_eq!(
            patients,
            vec![EntityPath::new("Patient", "P1"), EntityPath::new("Patient", "P2")]
        );
    }

    #[test]
    fn test_stream_yields_decode_error_and_continues() {
        let (backend, store) = fixture();
        backend
            .put(ENTITY_KEYSPACE, b"Patient=P1&Encounter=E15&", b"{")
            .unwrap();
        let mut stream = store
            .stream(&EntityPath::new("Patient", "P1"), &TypeTag::new("Encounter"))
            .unwrap();
        assert_eq!(stream.next().unwrap().unwrap().entity.n, 11);
        assert!(matches!(
            stream.next().unwrap(),
            Err(StorageError::Decode { .. })
        ));
        assert_eq!(stream.next().unwrap().unwrap().entity.n, 12);
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_abandoned_stream_is_harmless() {
        let (_, store) = fixture();
        let mut stream = store.stream_all(&TypeTag::new("Encounter")).unwrap();
        assert!(stream.next().is_some());
        drop(stream);
        store
            .save(&EntityPath::new("Patient", "P3"), &Record { n: 3 })
            .unwrap();
    }
}
