//! 点位 CRUD（按连接归属）

use crate::error::{ConnectionError, lock_failed};
use crate::manager::ConnectionManager;
use domain::{Tag, TagDraft, TagUpdate, now_epoch_ms};
use tracing::info;

impl ConnectionManager {
    /// 在连接下创建点位。点位地址的协议必须与连接一致。
    pub fn create_tag(&self, connection_id: &str, draft: TagDraft) -> Result<Tag, ConnectionError> {
        let connection = self.get_connection(connection_id)?;
        if draft.address.protocol() != connection.protocol {
            return Err(ConnectionError::InvalidTag(format!(
                "{} address on {} connection",
                draft.address.protocol(),
                connection.protocol
            )));
        }
        if draft.name.trim().is_empty() {
            return Err(ConnectionError::InvalidTag("tag name is empty".to_string()));
        }
        let tag = Tag {
            id: uuid::Uuid::new_v4().to_string(),
            connection_id: connection_id.to_string(),
            name: draft.name,
            address: draft.address,
            data_type: draft.data_type,
            description: draft.description,
            decimals: draft.decimals,
            unit: draft.unit,
            alarm: draft.alarm,
            enabled: draft.enabled,
            created_at: now_epoch_ms(),
        };
        self.inner
            .tags
            .write()
            .map_err(|_| lock_failed())?
            .entry(connection_id.to_string())
            .or_default()
            .push(tag.clone());
        info!(target: "gw.connection", connection_id = %connection_id, tag_id = %tag.id, "tag_created");
        Ok(tag)
    }

    pub fn list_tags(&self, connection_id: &str) -> Result<Vec<Tag>, ConnectionError> {
        self.get_connection(connection_id)?;
        Ok(self
            .inner
            .tags
            .read()
            .map_err(|_| lock_failed())?
            .get(connection_id)
            .cloned()
            .unwrap_or_default())
    }

    pub fn get_tag(&self, connection_id: &str, tag_id: &str) -> Result<Tag, ConnectionError> {
        self.list_tags(connection_id)?
            .into_iter()
            .find(|tag| tag.id == tag_id)
            .ok_or_else(|| ConnectionError::TagNotFound(tag_id.to_string()))
    }

    /// 连接下所有启用的点位（按创建顺序）。
    pub fn enabled_tags(&self, connection_id: &str) -> Result<Vec<Tag>, ConnectionError> {
        Ok(self
            .list_tags(connection_id)?
            .into_iter()
            .filter(|tag| tag.enabled)
            .collect())
    }

    /// 按给定顺序取出存在的点位，不存在的 ID 被忽略。
    pub fn tags_by_ids(&self, connection_id: &str, tag_ids: &[String]) -> Result<Vec<Tag>, ConnectionError> {
        let tags = self.list_tags(connection_id)?;
        Ok(tag_ids
            .iter()
            .filter_map(|id| tags.iter().find(|tag| &tag.id == id).cloned())
            .collect())
    }

    pub fn update_tag(
        &self,
        connection_id: &str,
        tag_id: &str,
        update: TagUpdate,
    ) -> Result<Tag, ConnectionError> {
        let connection = self.get_connection(connection_id)?;
        if let Some(address) = &update.address {
            if address.protocol() != connection.protocol {
                return Err(ConnectionError::InvalidTag(format!(
                    "{} address on {} connection",
                    address.protocol(),
                    connection.protocol
                )));
            }
        }
        let mut tags = self.inner.tags.write().map_err(|_| lock_failed())?;
        let tag = tags
            .get_mut(connection_id)
            .and_then(|items| items.iter_mut().find(|tag| tag.id == tag_id))
            .ok_or_else(|| ConnectionError::TagNotFound(tag_id.to_string()))?;
        if let Some(name) = update.name {
            tag.name = name;
        }
        if let Some(address) = update.address {
            tag.address = address;
        }
        if let Some(data_type) = update.data_type {
            tag.data_type = data_type;
        }
        if let Some(description) = update.description {
            tag.description = Some(description);
        }
        if let Some(decimals) = update.decimals {
            tag.decimals = Some(decimals);
        }
        if let Some(unit) = update.unit {
            tag.unit = Some(unit);
        }
        if let Some(alarm) = update.alarm {
            tag.alarm = Some(alarm);
        }
        if let Some(enabled) = update.enabled {
            tag.enabled = enabled;
        }
        Ok(tag.clone())
    }

    pub fn delete_tag(&self, connection_id: &str, tag_id: &str) -> Result<(), ConnectionError> {
        self.get_connection(connection_id)?;
        let mut tags = self.inner.tags.write().map_err(|_| lock_failed())?;
        let items = tags
            .get_mut(connection_id)
            .ok_or_else(|| ConnectionError::TagNotFound(tag_id.to_string()))?;
        let before = items.len();
        items.retain(|tag| tag.id != tag_id);
        if items.len() == before {
            return Err(ConnectionError::TagNotFound(tag_id.to_string()));
        }
        info!(target: "gw.connection", connection_id = %connection_id, tag_id = %tag_id, "tag_deleted");
        Ok(())
    }
}
