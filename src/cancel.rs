// 취소 토큰 - 오케스트레이터/오디오 스레드/호출자 간 공유 플래그

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 작업 취소 신호 (clone하면 같은 플래그 공유)
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    /// 상위 토큰 플래그 (하나라도 켜지면 취소로 간주)
    parents: Vec<Arc<AtomicBool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 하위 토큰: 상위가 취소되면 같이 취소되지만, 하위 취소는 상위에 전파되지 않음
    pub fn child_token(&self) -> Self {
        let mut parents = self.parents.clone();
        parents.push(Arc::clone(&self.flag));
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parents,
        }
    }

    /// 취소 요청
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.parents.iter().any(|p| p.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_child_follows_parent_only_downward() {
        let parent = CancellationToken::new();
        let child = parent.child_token();
        let grandchild = child.child_token();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
        assert!(!parent.is_cancelled());

        let parent = CancellationToken::new();
        let grandchild = parent.child_token().child_token();
        parent.cancel();
        assert!(grandchild.is_cancelled());
    }
}
