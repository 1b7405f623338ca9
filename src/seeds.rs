//! Built-in fallback bank.
//!
//! A few vetted quizzes per difficulty so the game keeps receiving questions
//! even when no completion endpoint is reachable and no TOML bank is configured.

use crate::domain::{Difficulty, Quiz, QuizSource, QuizType};

/// Curated quizzes (two per difficulty, one of each type). Every entry passes
/// validation and clears the quality gate.
pub fn seed_quizzes() -> Vec<Quiz> {
  vec![
    Quiz::new(QuizType::MultipleChoice, Difficulty::Easy, QuizSource::Fallback)
      .with_question("스타트업 서비스의 사용자 트래픽이 늘어나 EC2 인스턴스 2대로는 부족해졌습니다. 여러 EC2 인스턴스에 요청을 고르게 나누어 주는 AWS 서비스는 무엇인가요?")
      .with_options([
        "Application Load Balancer (ALB)",
        "Amazon CloudFront 배포",
        "Amazon Route53 호스팅 영역",
        "AWS Lambda 함수 URL",
      ])
      .with_answer("A")
      .with_explanation("ALB는 여러 EC2 인스턴스에 HTTP 요청을 분산하는 로드 밸런서입니다. 트래픽이 몰리는 경우에도 상태 확인을 통해 정상 인스턴스로만 요청을 보내기 때문에 가용성이 높아집니다. CloudFront는 콘텐츠 캐싱, Route53은 DNS, Lambda는 서버리스 실행 환경이므로 부하 분산 역할과는 다릅니다. 초기 단계 인프라에서는 ALB와 Auto Scaling을 함께 구성하는 것이 권장됩니다.")
      .with_infra(["EC2", "ALB"]),
    Quiz::new(QuizType::Ox, Difficulty::Easy, QuizSource::Fallback)
      .with_question("Amazon S3에 업로드한 객체는 기본적으로 하나의 가용 영역에만 저장되기 때문에 해당 가용 영역에 장애가 발생하면 데이터가 유실될 수 있다. 이 설명은 올바른가요?")
      .with_answer("false")
      .with_explanation("S3 Standard 스토리지 클래스는 객체를 최소 세 개의 가용 영역에 중복 저장하기 때문에 하나의 가용 영역에 장애가 발생해도 데이터가 유지됩니다. 99.999999999%의 내구성을 목표로 설계되어 있어 백업 용도로도 많이 사용됩니다. 다만 S3 One Zone-IA처럼 단일 가용 영역에만 저장하는 클래스를 선택한 경우에는 비용은 낮지만 가용성이 떨어진다는 점을 기억해야 합니다.")
      .with_infra(["S3"]),
    Quiz::new(QuizType::MultipleChoice, Difficulty::Medium, QuizSource::Fallback)
      .with_question("주문 데이터베이스로 RDS MySQL을 운영하는 서비스에서 읽기 트래픽이 급증하는 상황입니다. 쓰기 성능은 유지하면서 읽기 부하를 분산하고 장애 시 빠른 장애조치까지 고려할 때 가장 적절한 선택은 무엇인가요?")
      .with_options([
        "Aurora MySQL로 전환하고 읽기 전용 복제본을 추가한다",
        "RDS 인스턴스의 스토리지 용량만 두 배로 늘린다",
        "애플리케이션 서버의 EC2 인스턴스 수를 늘린다",
        "DynamoDB 테이블로 모든 데이터를 즉시 옮긴다",
      ])
      .with_answer("A")
      .with_explanation("Aurora는 스토리지를 여러 가용 영역에 복제하고 최대 15개의 읽기 전용 복제본을 지원하기 때문에 읽기 부하 분산과 빠른 장애조치에 유리합니다. 스토리지 용량을 늘리는 것은 처리 성능 문제를 해결하지 못하고, EC2 증설은 데이터베이스 병목을 그대로 남깁니다. DynamoDB 이전은 데이터 모델을 다시 설계해야 하므로 단기 대응으로는 비용과 위험이 큽니다.")
      .with_infra(["RDS", "Aurora"]),
    Quiz::new(QuizType::Ox, Difficulty::Medium, QuizSource::Fallback)
      .with_question("데이터베이스 읽기 부하가 높은 서비스에서 ElastiCache for Redis를 캐싱 계층으로 추가하면 자주 조회되는 데이터의 응답 시간을 줄이고 RDS 부하를 낮출 수 있다. 이 설명은 올바른가요?")
      .with_answer("true")
      .with_explanation("ElastiCache는 메모리 기반 저장소이므로 디스크 기반 데이터베이스보다 훨씬 빠르게 응답합니다. 자주 조회되는 데이터를 캐시에 두면 RDS로 가는 읽기 요청이 줄어들기 때문에 데이터베이스 비용과 부하를 함께 낮출 수 있습니다. 다만 데이터가 자주 바뀌는 경우에는 TTL과 캐시 무효화 전략을 함께 설계해야 일관성 문제를 피할 수 있습니다.")
      .with_infra(["ElastiCache", "RDS"]),
    Quiz::new(QuizType::MultipleChoice, Difficulty::Hard, QuizSource::Fallback)
      .with_question("글로벌 사용자를 가진 서비스가 EKS와 Aurora로 운영되고 있습니다. 한 리전 전체에 장애가 발생하는 경우에도 1분 이내에 서비스를 복구하고 비용 최적화까지 고려해야 하는 시나리오에서 가장 적절한 멀티리전 DR 아키텍처는 무엇인가요?")
      .with_options([
        "Aurora Global Database와 보조 리전 EKS 클러스터를 Route53 장애조치로 연결한다",
        "단일 리전의 Multi-AZ 구성만으로 리전 장애에 대비한다",
        "매일 밤 스냅샷을 다른 리전 S3 버킷에 복사해 두고 수동으로 복구한다",
        "전체 트래픽을 CloudFront 캐시로만 처리하고 원본 서버를 없앤다",
      ])
      .with_answer("A")
      .with_explanation("Aurora Global Database는 보조 리전으로 1초 미만의 지연으로 데이터를 복제하고 1분 안에 승격할 수 있기 때문에 짧은 복구 목표를 달성할 수 있습니다. 보조 리전의 EKS 클러스터는 Karpenter로 최소 노드만 유지하다가 장애 시 확장하면 비용을 최적화할 수 있습니다. Multi-AZ 구성은 리전 전체 장애를 막지 못하고, 스냅샷 수동 복구는 복구 시간 목표를 지키기 어렵습니다.")
      .with_infra(["EKS", "Karpenter", "Aurora"]),
    Quiz::new(QuizType::Ox, Difficulty::Hard, QuizSource::Fallback)
      .with_question("트래픽 변동이 큰 EKS 클러스터에서 Karpenter를 사용하면 대기 중인 Pod의 요구 사항에 맞춰 인스턴스 유형을 직접 선택해 노드를 프로비저닝하므로, 고정된 노드 그룹만 쓰는 방식보다 비용 최적화와 확장 속도에서 유리한 경우가 많다. 이 설명은 올바른가요?")
      .with_answer("true")
      .with_explanation("Karpenter는 노드 그룹에 묶이지 않고 스케줄링되지 못한 Pod의 CPU, 메모리, 아키텍처 요구를 보고 가장 알맞은 EC2 인스턴스를 바로 띄우기 때문에 확장이 빠릅니다. 또한 사용률이 낮은 노드를 통합하고 Spot 인스턴스와 함께 쓰면 비용을 크게 줄일 수 있습니다. 예를 들어 야간에 트래픽이 줄어드는 상황에서는 자동으로 노드를 정리해 불필요한 비용을 막아 줍니다.")
      .with_infra(["EKS", "Karpenter"]),
  ]
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_difficulty_has_both_types() {
    let seeds = seed_quizzes();
    for d in Difficulty::ALL {
      for t in [QuizType::MultipleChoice, QuizType::Ox] {
        assert!(seeds.iter().any(|q| q.difficulty == d && q.quiz_type == t), "missing {d} {t}");
      }
    }
    assert!(seeds.iter().all(|q| q.source == QuizSource::Fallback && q.is_active));
  }
}
