// +-----------------------------------------------------------------------------------------------+
// | Copyright 2016 Sean Kerr                                                                      |
// |                                                                                               |
// | Licensed under the Apache License, Version 2.0 (the "License");                               |
// | you may not use this file except in compliance with the License.                              |
// | You may obtain a copy of the License at                                                       |
// |                                                                                               |
// |  http://www.apache.org/licenses/LICENSE-2.0                                                   |
// |                                                                                               |
// | Unless required by applicable law or agreed to in writing, software                           |
// | distributed under the License is distributed on an "AS IS" BASIS,                             |
// | WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.                      |
// | See the License for the specific language governing permissions and                           |
// | limitations under the License.                                                                |
// +-----------------------------------------------------------------------------------------------+

//! A plain form field: a name/value pair, always kept in memory.

/// A completed `multipart/form-data` or `application/x-www-form-urlencoded` field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Field {
    name: Vec<u8>,
    value: Vec<u8>,
}

impl Field {
    pub(crate) fn new() -> Self {
        Field::default()
    }

    pub(crate) fn push_name(&mut self, data: &[u8]) {
        self.name.extend_from_slice(data);
    }

    pub(crate) fn push_value(&mut self, data: &[u8]) {
        self.value.extend_from_slice(data);
    }

    /// The field's name.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// The field's value.
    pub fn value(&self) -> &[u8] {
        &self.value
    }
}
