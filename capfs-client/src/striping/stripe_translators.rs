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

use crate::striping::{StripeTranslator, StripeTranslatorRaid0};
use capfs_common::error::FsError;
use capfs_common::state::StripingPolicyType;
use capfs_common::FsResult;
use std::collections::HashMap;

/// Registry of the translators known to the client, keyed by policy type.
pub struct StripeTranslators {
    translators: HashMap<StripingPolicyType, Box<dyn StripeTranslator>>,
}

impl StripeTranslators {
    pub fn empty() -> Self {
        Self {
            translators: HashMap::new(),
        }
    }

    pub fn register(&mut self, translator: Box<dyn StripeTranslator>) {
        self.translators.insert(translator.policy_type(), translator);
    }

    pub fn get(&self, policy_type: StripingPolicyType) -> FsResult<&dyn StripeTranslator> {
        match self.translators.get(&policy_type) {
            Some(v) => Ok(v.as_ref()),
            None => Err(FsError::config(format!(
                "no translator found for striping policy {:?}",
                policy_type
            ))),
        }
    }
}

impl Default for StripeTranslators {
    fn default() -> Self {
        let mut translators = Self::empty();
        translators.register(Box::new(StripeTranslatorRaid0::new()));
        translators
    }
}
