//! 키 기반 최대 힙
//!
//! 각 원소는 고유 키를 가지며, 키→인덱스 맵을 유지하므로
//! 우선순위 변경과 임의 원소 제거가 O(log n)입니다.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::error::QueueError;

#[derive(Debug, Clone)]
struct Node<K, V> {
    key: K,
    priority: i64,
    value: V,
}

/// 키 기반 최대 힙 우선순위 큐
///
/// # 사용 예시
/// ```
/// use perceptor_core::priority_queue::PriorityQueue;
///
/// let mut pq = PriorityQueue::new();
/// pq.add("a", 1, "low").unwrap();
/// pq.add("b", 5, "high").unwrap();
/// pq.set(&"a", 10).unwrap();
/// assert_eq!(pq.pop().unwrap().1, "low");
/// ```
#[derive(Debug, Clone)]
pub struct PriorityQueue<K, V> {
    items: Vec<Node<K, V>>,
    key_to_index: HashMap<K, usize>,
}

impl<K, V> Default for PriorityQueue<K, V>
where
    K: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> PriorityQueue<K, V>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new() -> Self {
        Self::with_capacity(10)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            key_to_index: HashMap::with_capacity(capacity),
        }
    }

    /// 원소를 추가합니다. 키는 고유해야 합니다.
    pub fn add(&mut self, key: K, priority: i64, value: V) -> Result<(), QueueError> {
        if self.key_to_index.contains_key(&key) {
            return Err(QueueError::DuplicateKey(format!("{key:?}")));
        }
        let index = self.items.len();
        self.key_to_index.insert(key.clone(), index);
        self.items.push(Node {
            key,
            priority,
            value,
        });
        self.sift_up(index);
        Ok(())
    }

    /// 우선순위가 가장 높은 원소를 제거하지 않고 반환합니다.
    pub fn peek(&self) -> Option<(&K, i64, &V)> {
        self.items
            .first()
            .map(|node| (&node.key, node.priority, &node.value))
    }

    /// 우선순위가 가장 높은 원소를 제거하여 반환합니다.
    pub fn pop(&mut self) -> Result<(K, V), QueueError> {
        if self.items.is_empty() {
            return Err(QueueError::Empty);
        }
        let node = self.remove_at(0);
        Ok((node.key, node.value))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 키의 우선순위를 변경합니다.
    pub fn set(&mut self, key: &K, priority: i64) -> Result<(), QueueError> {
        let index = *self
            .key_to_index
            .get(key)
            .ok_or_else(|| QueueError::KeyNotFound(format!("{key:?}")))?;
        self.items[index].priority = priority;
        let index = self.sift_up(index);
        self.sift_down(index);
        Ok(())
    }

    pub fn has_key(&self, key: &K) -> bool {
        self.key_to_index.contains_key(key)
    }

    /// 키에 해당하는 원소를 제거하여 값을 반환합니다.
    pub fn remove(&mut self, key: &K) -> Result<V, QueueError> {
        let index = *self
            .key_to_index
            .get(key)
            .ok_or_else(|| QueueError::KeyNotFound(format!("{key:?}")))?;
        Ok(self.remove_at(index).value)
    }

    /// 힙 순서의 값 목록 (디버깅용)
    pub fn values(&self) -> Vec<&V> {
        self.items.iter().map(|node| &node.value).collect()
    }

    /// 힙 순서의 (키, 우선순위) 목록 (디버깅용)
    pub fn dump(&self) -> Vec<(&K, i64)> {
        self.items
            .iter()
            .map(|node| (&node.key, node.priority))
            .collect()
    }

    /// 힙/인덱스 불변식 위반 목록을 반환합니다. 정상이라면 항상 비어 있습니다.
    pub fn check_validity(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let size = self.items.len();

        for (i, node) in self.items.iter().enumerate() {
            for child in [left_child(i), right_child(i)] {
                if child < size && self.items[child].priority > node.priority {
                    errors.push(format!(
                        "parent {i}({}) has lower priority than child {child}({})",
                        node.priority, self.items[child].priority
                    ));
                }
            }
        }

        for (key, &index) in &self.key_to_index {
            match self.items.get(index) {
                Some(node) if &node.key == key => {}
                Some(node) => errors.push(format!(
                    "key {key:?} maps to index {index} holding key {:?}",
                    node.key
                )),
                None => errors.push(format!("key {key:?} maps to out-of-range index {index}")),
            }
        }

        if self.key_to_index.len() != size {
            errors.push(format!(
                "key_to_index size {} but queue size is {size}",
                self.key_to_index.len()
            ));
        }

        errors
    }

    fn remove_at(&mut self, index: usize) -> Node<K, V> {
        let node = self.items.swap_remove(index);
        self.key_to_index.remove(&node.key);
        if index < self.items.len() {
            self.key_to_index.insert(self.items[index].key.clone(), index);
            let index = self.sift_up(index);
            self.sift_down(index);
        }
        node
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.items.swap(i, j);
        self.key_to_index.insert(self.items[i].key.clone(), i);
        self.key_to_index.insert(self.items[j].key.clone(), j);
    }

    fn sift_up(&mut self, mut index: usize) -> usize {
        while index > 0 {
            let p = parent(index);
            if self.items[index].priority <= self.items[p].priority {
                break;
            }
            self.swap(index, p);
            index = p;
        }
        index
    }

    fn sift_down(&mut self, mut index: usize) {
        let size = self.items.len();
        loop {
            let mut next = index;
            let l = left_child(index);
            let r = right_child(index);
            if l < size && self.items[l].priority > self.items[next].priority {
                next = l;
            }
            if r < size && self.items[r].priority > self.items[next].priority {
                next = r;
            }
            if next == index {
                break;
            }
            self.swap(index, next);
            index = next;
        }
    }
}

fn parent(index: usize) -> usize {
    (index - 1) / 2
}

fn left_child(index: usize) -> usize {
    index * 2 + 1
}

fn right_child(index: usize) -> usize {
    index * 2 + 2
}
