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

use crate::rpc::{MrcServiceClient, OsdServiceClient, RpcCaller, UuidIterator, UuidResolver};
use crate::striping::StripeTranslators;
use crate::ClientMetrics;
use capfs_common::conf::ClientConf;
use capfs_common::state::{Auth, UserCredentials};
use capfs_common::{err_box, FsResult};
use log::info;
use std::sync::Arc;

// State shared by every open file of one client, shared through Arc.
// 1. The client configuration.
// 2. The service clients and the uuid resolver.
// 3. The endpoints of the metadata service.
pub struct FsContext {
    pub(crate) conf: ClientConf,
    pub(crate) mrc_client: Arc<dyn MrcServiceClient>,
    pub(crate) osd_client: Arc<dyn OsdServiceClient>,
    pub(crate) mrc_uuid_iterator: UuidIterator,
    pub(crate) translators: StripeTranslators,
    pub(crate) caller: RpcCaller,
    pub(crate) auth: Auth,
    // Used by background work that has no caller identity.
    pub(crate) service_creds: UserCredentials,
    pub(crate) metrics: ClientMetrics,
}

impl FsContext {
    pub fn new(
        conf: ClientConf,
        resolver: Arc<dyn UuidResolver>,
        mrc_client: Arc<dyn MrcServiceClient>,
        osd_client: Arc<dyn OsdServiceClient>,
        mrc_uuids: Vec<String>,
    ) -> FsResult<Self> {
        if mrc_uuids.is_empty() {
            return err_box!("at least one mrc uuid is required");
        }

        let caller = RpcCaller::new(resolver, conf.retry_delay);
        let service_creds = UserCredentials::new(conf.service_user.clone(), vec![]);
        let metrics = ClientMetrics::new()?;

        info!(
            "create fs context, client {}, mrc {:?}, max_tries {}, async writes {}",
            conf.client_uuid, mrc_uuids, conf.max_tries, conf.enable_async_writes
        );

        Ok(Self {
            mrc_uuid_iterator: UuidIterator::with_uuids(mrc_uuids),
            translators: StripeTranslators::default(),
            auth: Auth::None,
            conf,
            mrc_client,
            osd_client,
            caller,
            service_creds,
            metrics,
        })
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_translators(mut self, translators: StripeTranslators) -> Self {
        self.translators = translators;
        self
    }

    pub fn conf(&self) -> &ClientConf {
        &self.conf
    }

    pub fn client_uuid(&self) -> &str {
        &self.conf.client_uuid
    }

    pub fn metrics(&self) -> &ClientMetrics {
        &self.metrics
    }

    pub fn mrc_uuid_iterator(&self) -> &UuidIterator {
        &self.mrc_uuid_iterator
    }
}
