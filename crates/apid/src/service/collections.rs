//! Key/value, set and hash operations.
//!
//! Integer results are the broker's own counts: members added or removed,
//! keys deleted, fields created.

use super::{boxed, Apid};
use crate::domain::{Command, SetEntry};
use crate::error::ApidResult;
use crate::registry::{Callback, OperationHandle};

impl Apid {
    /// `SET key value`.
    pub fn kv_set<F>(
        &self,
        key: &str,
        value: &str,
        callback: Option<F>,
    ) -> ApidResult<OperationHandle>
    where
        F: FnOnce(ApidResult<()>) + Send + 'static,
    {
        self.submit(Command::set(key, value), boxed(callback))
    }

    /// `GET key`. `None` when the key does not exist.
    pub fn kv_get<F>(&self, key: &str, callback: F) -> ApidResult<OperationHandle>
    where
        F: FnOnce(ApidResult<Option<String>>) + Send + 'static,
    {
        self.submit(Command::get(key), Some(Box::new(callback) as Callback<_>))
    }

    /// `SADD key member`. Adding an existing member reports 0.
    pub fn set_add<F>(
        &self,
        key: &str,
        member: &str,
        callback: Option<F>,
    ) -> ApidResult<OperationHandle>
    where
        F: FnOnce(ApidResult<i64>) + Send + 'static,
    {
        self.submit(Command::sadd(key, member), boxed(callback))
    }

    /// `SREM key member`.
    pub fn set_remove<F>(
        &self,
        key: &str,
        member: &str,
        callback: Option<F>,
    ) -> ApidResult<OperationHandle>
    where
        F: FnOnce(ApidResult<i64>) + Send + 'static,
    {
        self.submit(Command::srem(key, member), boxed(callback))
    }

    /// `DEL key`.
    pub fn set_clear<F>(&self, key: &str, callback: Option<F>) -> ApidResult<OperationHandle>
    where
        F: FnOnce(ApidResult<i64>) + Send + 'static,
    {
        self.submit(Command::del(key), boxed(callback))
    }

    /// `SMEMBERS key`. The callback sees every member once, in no particular
    /// order, then [`SetEntry::Done`]. A failure is reported once instead.
    pub fn set_iterate<F>(&self, key: &str, mut callback: F) -> ApidResult<OperationHandle>
    where
        F: FnMut(ApidResult<SetEntry>) + Send + 'static,
    {
        let completion: Callback<Vec<String>> = Box::new(move |result| match result {
            Ok(members) => {
                for member in members {
                    callback(Ok(SetEntry::Member(member)));
                }
                callback(Ok(SetEntry::Done));
            }
            Err(e) => callback(Err(e)),
        });
        self.submit(Command::smembers(key), Some(completion))
    }

    /// `SISMEMBER key member`.
    pub fn set_contains<F>(
        &self,
        key: &str,
        member: &str,
        callback: F,
    ) -> ApidResult<OperationHandle>
    where
        F: FnOnce(ApidResult<bool>) + Send + 'static,
    {
        self.submit(
            Command::sismember(key, member),
            Some(Box::new(callback) as Callback<_>),
        )
    }

    /// `DEL key`.
    pub fn hash_clear<F>(&self, key: &str, callback: Option<F>) -> ApidResult<OperationHandle>
    where
        F: FnOnce(ApidResult<i64>) + Send + 'static,
    {
        self.submit(Command::del(key), boxed(callback))
    }

    /// `HSET key field value`. Reports 1 for a new field, 0 for an update.
    pub fn hash_set<F>(
        &self,
        key: &str,
        field: &str,
        value: &str,
        callback: Option<F>,
    ) -> ApidResult<OperationHandle>
    where
        F: FnOnce(ApidResult<i64>) + Send + 'static,
    {
        self.submit(Command::hset(key, field, value), boxed(callback))
    }

    /// `HGET key field`. `None` when the key or field is absent.
    pub fn hash_get<F>(&self, key: &str, field: &str, callback: F) -> ApidResult<OperationHandle>
    where
        F: FnOnce(ApidResult<Option<String>>) + Send + 'static,
    {
        self.submit(
            Command::hget(key, field),
            Some(Box::new(callback) as Callback<_>),
        )
    }
}
