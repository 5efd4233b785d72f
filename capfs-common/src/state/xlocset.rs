// Copyright 2025 OPPO.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::error::FsError;
use crate::FsResult;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StripingPolicyType {
    Raid0,
    ErasureCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripingPolicy {
    pub policy_type: StripingPolicyType,
    // Object size in bytes.
    pub stripe_size: u64,
    // Number of OSDs the objects of one replica are spread over.
    pub width: u32,
}

impl StripingPolicy {
    pub fn raid0(stripe_size: u64, width: u32) -> Self {
        Self {
            policy_type: StripingPolicyType::Raid0,
            stripe_size,
            width,
        }
    }
}

pub struct ReplicationFlags;

impl ReplicationFlags {
    pub const IS_COMPLETE: u32 = 1;
    pub const FULL_REPLICA: u32 = 1 << 1;
    pub const STRATEGY_RANDOM: u32 = 1 << 2;
    pub const STRATEGY_RAREST_FIRST: u32 = 1 << 3;
    pub const STRATEGY_SEQUENTIAL: u32 = 1 << 4;
    pub const STRATEGY_SEQUENTIAL_PREFETCHING: u32 = 1 << 5;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replica {
    pub osd_uuids: Vec<String>,
    pub replication_flags: u32,
    pub striping_policy: StripingPolicy,
}

impl Replica {
    pub fn new(osd_uuids: Vec<String>, striping_policy: StripingPolicy) -> Self {
        Self {
            osd_uuids,
            replication_flags: 0,
            striping_policy,
        }
    }

    pub fn head_osd(&self) -> Option<&str> {
        self.osd_uuids.first().map(|x| x.as_str())
    }

    pub fn is_full_replica(&self) -> bool {
        self.replication_flags & ReplicationFlags::FULL_REPLICA != 0
    }

    pub fn is_striped(&self) -> bool {
        self.osd_uuids.len() > 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReplicaUpdatePolicy {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "ronly")]
    ReadOnly,
    #[serde(rename = "WaR1")]
    WaR1,
    #[serde(rename = "WaRa")]
    WaRa,
    #[serde(rename = "WqRq")]
    WqRq,
}

/// The replicas of a file together with their storage nodes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct XLocSet {
    pub version: u32,
    pub read_only_file_size: u64,
    pub replica_update_policy: ReplicaUpdatePolicy,
    pub replicas: Vec<Replica>,
}

impl XLocSet {
    pub fn new(replicas: Vec<Replica>) -> Self {
        Self {
            replicas,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    pub fn replica(&self, index: usize) -> FsResult<&Replica> {
        self.replicas.get(index).ok_or_else(|| {
            FsError::common(format!(
                "replica {} not found, xlocset has {} replicas",
                index,
                self.replicas.len()
            ))
        })
    }

    /// Uuid of the OSD at position `stripe_index` of replica `replica_index`.
    pub fn osd_uuid(&self, replica_index: usize, stripe_index: usize) -> FsResult<&str> {
        let replica = self.replica(replica_index)?;
        match replica.osd_uuids.get(stripe_index) {
            Some(v) => Ok(v.as_str()),
            None => Err(FsError::common(format!(
                "osd {} not found in replica {}, replica has {} osds",
                stripe_index,
                replica_index,
                replica.osd_uuids.len()
            ))),
        }
    }

    pub fn find_replica_by_head_osd(&self, osd_uuid: &str) -> Option<&Replica> {
        self.replicas
            .iter()
            .find(|r| r.head_osd() == Some(osd_uuid))
    }

    pub fn is_read_only(&self) -> bool {
        self.replica_update_policy == ReplicaUpdatePolicy::ReadOnly
    }
}

impl Display for XLocSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}
